// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end checks through [`Shim`] on the hosted platform.

use core::ffi::c_void;
use core::net::{Ipv4Addr, SocketAddrV4};
use core::ptr;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::clock::TimeVal;
use crate::config::ShimConfig;
use crate::hosted::{CaptureConsole, HostPlatform, POISON};
use crate::platform::Heap;
use crate::shim::Shim;

const NOW: i64 = 1_600_000_000;
const TAG: usize = 0x5afe;
const BANNER_END: &str = ">>>End of Fett<<<\r\n";

type TestShim = Shim<HostPlatform, CaptureConsole, ChaCha8Rng>;

fn config() -> ShimConfig {
    ShimConfig {
        fixed_time: Some(NOW),
        seeds: &[4, 7, 234],
        channel_capacity: 64,
        realloc_tag: TAG,
    }
}

fn shim_with(config: ShimConfig) -> (TestShim, CaptureConsole) {
    let con = CaptureConsole::default();
    let shim = Shim::new(
        HostPlatform::new(),
        con.clone(),
        ChaCha8Rng::seed_from_u64(0),
        config,
    );
    (shim, con)
}

/// Runs `f`, which is expected to end the program, and checks that it did.
fn expect_halt(shim: &TestShim, f: impl FnOnce(&TestShim)) {
    let r = catch_unwind(AssertUnwindSafe(|| f(shim)));
    assert!(r.is_err(), "expected the platform to halt");
    assert!(shim.diag().is_latched());
}

#[test]
fn fill_then_overflow() {
    let (shim, con) = shim_with(config());

    assert!(shim.send(&[0x42; 64]));
    assert!(!shim.send(&[0x43]));
    assert!(con.contents().contains("(Error)~"));
    assert!(con.contents().contains("[ret=0]"));

    let mut buf = [0; 128];
    assert_eq!(shim.receive(&mut buf), 64);
    assert!(buf[..64].iter().all(|&b| b == 0x42));
    assert_eq!(shim.receive(&mut buf), 0);
}

#[test]
fn send_receive_in_order_once() {
    let (shim, con) = shim_with(config());
    assert!(shim.send(b"hello, "));
    assert!(shim.send(b"world"));

    let mut buf = [0; 64];
    assert_eq!(shim.receive(&mut buf), 12);
    assert_eq!(&buf[..12], b"hello, world");
    assert_eq!(shim.receive(&mut buf), 0);
    assert_eq!(con.contents(), "");
}

#[test]
fn receive_before_send_is_zero_and_logged() {
    let (shim, con) = shim_with(config());
    let mut buf = [0; 4];
    assert_eq!(shim.receive(&mut buf), 0);
    assert!(con.contents().starts_with("(Error)~"));
}

#[test]
fn channel_creation_retried() {
    let (shim, _) = shim_with(config());
    shim.platform().fail_next_channel();
    assert!(!shim.send(b"x"));
    assert!(!shim.transport().is_open());
    assert!(shim.send(b"y"));
    assert_eq!(shim.platform().channels_created(), 1);
}

#[test]
fn split_ends() {
    let (mut shim, _) = shim_with(config());
    let (mut tx, mut rx) = shim.split();
    tx.send(b"abc").unwrap();
    let mut buf = [0; 3];
    assert_eq!(rx.receive(&mut buf), Ok(3));
    assert_eq!(&buf, b"abc");
}

#[test]
fn seeds_cycle() {
    let (shim, _) = shim_with(config());
    let got: Vec<u8> = (0..4)
        .map(|_| {
            let mut out = [0u8; 4];
            assert_eq!(shim.generate_seed(&mut out), 0);
            out[0]
        })
        .collect();
    assert_eq!(got, [4, 7, 234, 4]);
}

#[test]
fn clocks_agree() {
    let (shim, _) = shim_with(config());
    let mut tv = TimeVal::default();
    shim.gettimeofday(Some(&mut tv), false);
    assert_eq!(tv.tv_sec, shim.crypto_time());
    assert_eq!(tv.tv_usec, 0);
}

#[test]
fn missing_timeval_exits_with_1() {
    let (shim, con) = shim_with(config());
    expect_halt(&shim, |s| s.gettimeofday(None, false));
    let log = con.contents();
    assert!(log.starts_with("<INVALID>"));
    assert!(log.contains("EXIT: exiting FETT with code <1>"));
    assert!(log.ends_with(BANNER_END));
}

#[test]
fn unconfigured_time_exits_with_2() {
    let (shim, con) = shim_with(ShimConfig {
        fixed_time: None,
        ..config()
    });
    expect_halt(&shim, |s| {
        s.crypto_time();
    });
    assert!(con.contents().contains("EXIT: exiting FETT with code <2>"));
}

#[test]
fn open_is_fatal() {
    let (shim, con) = shim_with(config());
    expect_halt(&shim, |s| s.open(0));
    let log = con.contents();
    assert!(log.starts_with("FATAL ERROR:"));
    assert!(log.contains("code <1>"));
}

#[test]
fn silent_after_exit() {
    let (shim, con) = shim_with(config());
    shim.exit(0);
    let after_exit = con.contents();
    assert!(after_exit.ends_with(BANNER_END));

    // Every path that would normally log.
    let mut buf = [0; 4];
    assert_eq!(shim.receive(&mut buf), 0);
    shim.platform().fail_next_channel();
    assert!(!shim.send(b"x"));
    shim.log(format_args!("(Error)~  still here\r\n"));
    shim.exit(1);
    expect_halt(&shim, |s| s.open(0));

    assert_eq!(con.contents(), after_exit);
    assert_eq!(con.contents().matches(BANNER_END).count(), 1);
}

#[test]
fn tagged_realloc_is_bounded() {
    let (shim, con) = shim_with(config());
    let heap = shim.platform().heap();

    let p = unsafe { shim.realloc(ptr::null_mut(), 4, TAG, 0) };
    assert!(!p.is_null());
    unsafe { ptr::write_bytes(p.cast::<u8>(), 1, 4) };

    let q = unsafe { shim.realloc(p, 8, TAG, 4) }.cast::<u8>();
    let got = unsafe { core::slice::from_raw_parts(q, 8) };
    assert_eq!(got, [1, 1, 1, 1, POISON, POISON, POISON, POISON]);
    assert_eq!(heap.live_blocks(), 1);

    assert!(unsafe { shim.realloc(q.cast(), 0, TAG, 8) }.is_null());
    assert_eq!(heap.live_blocks(), 0);
    assert!(unsafe { shim.realloc(ptr::null_mut(), 0, TAG, 0) }.is_null());
    assert_eq!(con.contents(), "");
}

#[test]
fn untagged_realloc_warns() {
    let (shim, con) = shim_with(config());
    let p = shim.platform().allocate(16).unwrap().as_ptr().cast::<c_void>();
    let q = unsafe { shim.realloc(p, 8, 0, 0) };
    assert!(!q.is_null());
    assert!(con.contents().starts_with("Warning:"));
    unsafe { shim.realloc(q, 0, 0, 0) };
}

#[test]
fn realloc_out_of_memory_exits_with_2() {
    let (shim, con) = shim_with(config());
    let p = shim.platform().allocate(4).unwrap().as_ptr().cast::<c_void>();
    shim.platform().heap().fail_next_allocation();
    expect_halt(&shim, |s| unsafe {
        s.realloc(p, 32, TAG, 4);
    });
    assert!(con.contents().contains("code <2>"));
}

#[test]
fn sequence_numbers_come_from_the_rng() {
    let (shim, _) = shim_with(config());
    let mut twin = ChaCha8Rng::seed_from_u64(0);
    let a = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1234);
    let b = SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 80);
    for _ in 0..3 {
        assert_eq!(shim.next_sequence_number(a, b), twin.next_u32());
    }
}
