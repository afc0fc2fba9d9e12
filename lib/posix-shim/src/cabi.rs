// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! C calling conventions in front of a [`Shim`].
//!
//! Each function here takes the raw pointers and integers a C caller passes
//! and turns them into what the shim's safe API wants: null pointers into
//! empty slices or `None`, the allocator argument into a tag, network byte
//! order into addresses. The exported symbols in the `freertos` build are
//! one-line wrappers around these.

use core::ffi::{c_char, c_int, c_void, CStr};
use core::fmt::{self, Write};
use core::net::{Ipv4Addr, SocketAddrV4};
use core::slice;
use rand_core::RngCore;

use crate::clock::TimeVal;
use crate::diag::log_line;
use crate::platform::Platform;
use crate::shim::Shim;

/// An endpoint as FreeRTOS+TCP passes it: address and port both in network
/// byte order, stored in native integers.
pub fn endpoint(addr: u32, port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::from(u32::from_be(addr)), u16::from_be(port))
}

pub fn next_sequence_number<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    src_addr: u32,
    src_port: u16,
    dst_addr: u32,
    dst_port: u16,
) -> u32 {
    shim.next_sequence_number(
        endpoint(src_addr, src_port),
        endpoint(dst_addr, dst_port),
    )
}

/// # Safety
///
/// `tv` must be null or valid for writes. `tz` is never dereferenced.
pub unsafe fn gettimeofday<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    tv: *mut TimeVal,
    tz: *const c_void,
) -> c_int {
    shim.gettimeofday(tv.as_mut(), !tz.is_null());
    0
}

/// The allocator argument, read as a tag. Callers that know the old size
/// pass the configured tag value cast to a pointer; everyone else passes
/// null or a real heap handle.
pub fn heap_tag(heap: *const c_void) -> usize {
    heap as usize
}

/// # Safety
///
/// As [`Shim::realloc`].
pub unsafe fn realloc<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    block: *mut c_void,
    new_size: usize,
    heap: *const c_void,
    old_size: c_int,
) -> *mut c_void {
    shim.realloc(block, new_size, heap_tag(heap), old_size)
}

/// # Safety
///
/// `out` must be null or valid for writes of `size` bytes.
pub unsafe fn generate_seed<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    out: *mut u8,
    size: u32,
) -> c_int {
    let out: &mut [u8] = if out.is_null() {
        &mut []
    } else {
        slice::from_raw_parts_mut(out, size as usize)
    };
    shim.generate_seed(out)
}

/// Returns 1 if all `len` bytes were sent and 0 otherwise.
///
/// # Safety
///
/// `data` must be null or valid for reads of `len` bytes.
pub unsafe fn send<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    data: *const u8,
    len: usize,
) -> u8 {
    let data: &[u8] = if data.is_null() {
        if len != 0 {
            log_line!(shim.diag(), "(Error)~  send: No data to send. [len={len}]");
            return 0;
        }
        &[]
    } else {
        slice::from_raw_parts(data, len)
    };
    u8::from(shim.send(data))
}

/// # Safety
///
/// `buf` must be null or valid for writes of `len` bytes.
pub unsafe fn recv<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    buf: *mut u8,
    len: usize,
) -> usize {
    let buf: &mut [u8] = if buf.is_null() {
        if len != 0 {
            log_line!(
                shim.diag(),
                "(Error)~  receive: No buffer to receive into. [len={len}]"
            );
            return 0;
        }
        &mut []
    } else {
        slice::from_raw_parts_mut(buf, len)
    };
    shim.receive(buf)
}

/// Prints `text` as it is. C callers format first; there is no format
/// string here.
///
/// # Safety
///
/// `text` must be null or point to a NUL-terminated string.
pub unsafe fn log<P: Platform, C: Write, R: RngCore>(
    shim: &Shim<P, C, R>,
    text: *const c_char,
) {
    if text.is_null() {
        return;
    }
    let text = CStr::from_ptr(text);
    shim.log(format_args!("{}", Lossy(text.to_bytes())));
}

/// Text from C that may not be UTF-8.
struct Lossy<'a>(&'a [u8]);

impl fmt::Display for Lossy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.0.utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{fffd}")?;
            }
        }
        Ok(())
    }
}

/// Feeds `bytes` to a console that can only print NUL-free runs: each run
/// goes to `put_run` and each NUL to `put_nul`, in order.
pub fn split_at_nul(
    bytes: &[u8],
    mut put_run: impl FnMut(&[u8]),
    mut put_nul: impl FnMut(),
) {
    let mut runs = bytes.split(|&b| b == 0);
    if let Some(first) = runs.next() {
        if !first.is_empty() {
            put_run(first);
        }
    }
    for run in runs {
        put_nul();
        if !run.is_empty() {
            put_run(run);
        }
    }
}
