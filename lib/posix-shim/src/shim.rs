// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The shim as its callers see it.
//!
//! [`Shim`] owns the state the components share (the console and its latch,
//! the transport, the seed cursor, the pseudo-random source) and translates
//! their `Result`s into what a libc-shaped signature can carry. Where the
//! signature has an error channel (a flag or a count) the caller gets the
//! failure. Where it doesn't, the failure is logged, the exit banner printed
//! and the platform halted.

use core::ffi::{c_int, c_void};
use core::fmt::{self, Write};
use core::net::SocketAddrV4;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU32, Ordering};
use rand_core::RngCore;
use ringbuf::{ringbuf, ringbuf_entry};
use spin::Mutex;

use crate::clock::{time_t, FixedClock, TimeVal};
use crate::config::ShimConfig;
use crate::diag::{log_line, Diag};
use crate::error::{Fatal, TransportError};
use crate::platform::Platform;
use crate::seed::SeedCursor;
use crate::transport::{Receiver, Sender, Transport};
use crate::{fs, isn, realloc};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Abort(Fatal),
    SendFailed(TransportError),
    ReceiveNotOpen,
    RngBusy(u32),
}

ringbuf!(Trace, 16, Trace::None);

/// Added to the last sequence number when the RNG is in use elsewhere. Odd,
/// so repeated steps visit every value before wrapping.
const ISN_STRIDE: u32 = 0x0001_0f3d;

pub struct Shim<P: Platform, C, R> {
    platform: P,
    diag: Diag<C>,
    transport: Transport<P::Channel>,
    clock: FixedClock,
    seeds: SeedCursor,
    rng: Mutex<R>,
    last_isn: AtomicU32,
    realloc_tag: usize,
}

impl<P: Platform, C: Write, R: RngCore> Shim<P, C, R> {
    pub const fn new(platform: P, console: C, rng: R, config: ShimConfig) -> Self {
        Self {
            platform,
            diag: Diag::new(console),
            transport: Transport::new(config.channel_capacity),
            clock: FixedClock::new(config.fixed_time),
            seeds: SeedCursor::new(config.seeds),
            rng: Mutex::new(rng),
            last_isn: AtomicU32::new(0),
            realloc_tag: config.realloc_tag,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn diag(&self) -> &Diag<C> {
        &self.diag
    }

    pub fn transport(&self) -> &Transport<P::Channel> {
        &self.transport
    }

    /// Console output, silent once the program has exited.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        self.diag.logf(args);
    }

    /// Prints the exit banner (the first time only) and silences the
    /// console. Execution carries on; what happens next is the caller's
    /// business.
    pub fn exit(&self, code: u8) {
        self.diag.terminate(code);
    }

    /// Reports `fatal` as the last words of the program and halts.
    pub fn abort(&self, fatal: Fatal) -> ! {
        ringbuf_entry!(Trace::Abort(fatal));
        log_line!(self.diag, "{fatal}");
        self.diag.terminate(fatal.exit_code());
        self.platform.halt()
    }

    /// Sends all of `data`, or nothing. The reason for a failure has
    /// already been logged.
    pub fn send(&self, data: &[u8]) -> bool {
        match self.transport.send(&self.platform, &self.diag, data) {
            Ok(()) => true,
            Err(e) => {
                ringbuf_entry!(Trace::SendFailed(e));
                false
            }
        }
    }

    /// Receives up to `buf.len()` bytes. Zero means nothing was waiting, or
    /// that nothing was ever sent; only the second is logged.
    pub fn receive(&self, buf: &mut [u8]) -> usize {
        match self.transport.receive(&self.diag, buf) {
            Ok(n) => n,
            Err(_) => {
                ringbuf_entry!(Trace::ReceiveNotOpen);
                0
            }
        }
    }

    /// Hands out the two ends of the transport.
    pub fn split(&mut self) -> (Sender<'_, P, C>, Receiver<'_, P::Channel, C>) {
        self.transport.split(&self.platform, &self.diag)
    }

    /// `realloc` with the crypto library's extra arguments. When `heap_tag`
    /// is the configured tag, `old_size` is the size of `block` and no more
    /// than that is copied; otherwise `new_size` bytes are copied out of
    /// `block` on trust.
    ///
    /// # Safety
    ///
    /// `block` must be null or a live allocation from this shim's heap. In
    /// the untagged case it must also be readable for `new_size` bytes.
    pub unsafe fn realloc(
        &self,
        block: *mut c_void,
        new_size: usize,
        heap_tag: usize,
        old_size: c_int,
    ) -> *mut c_void {
        let block = NonNull::new(block.cast::<u8>());
        let resized = if heap_tag == self.realloc_tag {
            // A negative size can only be a confused caller; copy nothing.
            let old_size = usize::try_from(old_size).unwrap_or(0);
            realloc::resize_bounded(&self.platform, block, new_size, old_size)
        } else {
            realloc::resize_unbounded(&self.platform, &self.diag, block, new_size)
        };
        match resized {
            Ok(Some(b)) => b.as_ptr().cast(),
            Ok(None) => ptr::null_mut(),
            Err(fatal) => self.abort(fatal),
        }
    }

    /// `gettimeofday`.
    pub fn gettimeofday(&self, out: Option<&mut TimeVal>, tz_supplied: bool) {
        if let Err(fatal) = self.clock.wall_clock(&self.diag, out, tz_supplied) {
            self.abort(fatal);
        }
    }

    /// `time`, for the crypto library.
    pub fn crypto_time(&self) -> time_t {
        match self.clock.crypto_time() {
            Ok(t) => t,
            Err(fatal) => self.abort(fatal),
        }
    }

    /// The crypto library's seed hook. Always reports success.
    pub fn generate_seed(&self, out: &mut [u8]) -> c_int {
        self.seeds.generate(out);
        0
    }

    /// Initial sequence number for a new TCP connection.
    ///
    /// The TCP/IP stack only asks from its own task, so the RNG should never
    /// be busy. If it is (a caller preempted mid-draw by another), the answer
    /// steps on from the last one rather than waiting.
    pub fn next_sequence_number(&self, src: SocketAddrV4, dst: SocketAddrV4) -> u32 {
        match self.rng.try_lock() {
            Some(mut rng) => {
                let isn = isn::next_initial_sequence_number(&mut *rng, src, dst);
                self.last_isn.store(isn, Ordering::SeqCst);
                isn
            }
            None => {
                let isn = self
                    .last_isn
                    .fetch_add(ISN_STRIDE, Ordering::SeqCst)
                    .wrapping_add(ISN_STRIDE);
                ringbuf_entry!(Trace::RngBusy(isn));
                isn
            }
        }
    }

    /// `open`. Doesn't return.
    pub fn open(&self, flags: c_int) -> ! {
        self.abort(fs::open(flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted::{CaptureConsole, HostPlatform};
    use core::net::Ipv4Addr;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn busy_rng_steps_instead_of_waiting() {
        let shim = Shim::new(
            HostPlatform::new(),
            CaptureConsole::default(),
            ChaCha8Rng::seed_from_u64(9),
            ShimConfig::BUILT,
        );
        let a = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        let b = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2);

        let first = shim.next_sequence_number(a, b);

        // Another context is mid-draw.
        let held = shim.rng.lock();
        let second = shim.next_sequence_number(a, b);
        let third = shim.next_sequence_number(a, b);
        drop(held);

        assert_eq!(second, first.wrapping_add(ISN_STRIDE));
        assert_eq!(third, second.wrapping_add(ISN_STRIDE));
    }
}
