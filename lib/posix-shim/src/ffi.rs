// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The shim bound to FreeRTOS, and the C symbols the TCP/IP stack and the
//! crypto library link against.
//!
//! The heap is `pvPortMalloc`/`vPortFree`, the channel is a message buffer
//! (so each send arrives whole, and takes four bytes of length header out of
//! the capacity), the pseudo-random source is `uxRand` and the console is
//! `printf`. Halting deletes the calling task.
//!
//! The kernel bindings assume FreeRTOS 10.x, where message buffers are
//! created through the three-argument `xStreamBufferGenericCreate`.

use core::ffi::{c_char, c_int, c_long, c_ulong, c_void};
use core::fmt;
use core::ptr::{self, NonNull};
use rand_core::{impls, RngCore};

use crate::cabi;
use crate::clock::{time_t, TimeVal};
use crate::config::ShimConfig;
use crate::platform::{ByteChannel, Heap, Platform};
use crate::shim::Shim;

#[allow(non_camel_case_types)]
type BaseType_t = c_long;
#[allow(non_camel_case_types)]
type UBaseType_t = c_ulong;
#[allow(non_camel_case_types)]
type TickType_t = c_ulong;

const PD_TRUE: BaseType_t = 1;

extern "C" {
    fn pvPortMalloc(size: usize) -> *mut c_void;
    fn vPortFree(block: *mut c_void);
    fn uxRand() -> UBaseType_t;
    fn xStreamBufferGenericCreate(
        size: usize,
        trigger_level: usize,
        is_message_buffer: BaseType_t,
    ) -> *mut c_void;
    fn xStreamBufferSend(
        buffer: *mut c_void,
        data: *const c_void,
        len: usize,
        ticks_to_wait: TickType_t,
    ) -> usize;
    fn xStreamBufferReceive(
        buffer: *mut c_void,
        data: *mut c_void,
        len: usize,
        ticks_to_wait: TickType_t,
    ) -> usize;
    fn vTaskDelete(task: *mut c_void);
    fn printf(format: *const c_char, ...) -> c_int;
}

pub struct KernelPlatform;

pub struct KernelChannel(NonNull<c_void>);

// A message buffer may be used from one writing task and one reading task at
// once, which is all the transport does with it.
unsafe impl Send for KernelChannel {}
unsafe impl Sync for KernelChannel {}

pub struct KernelConsole;

pub struct KernelRng;

impl Heap for KernelPlatform {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { pvPortMalloc(size) }.cast())
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        vPortFree(block.as_ptr().cast())
    }
}

impl Platform for KernelPlatform {
    type Channel = KernelChannel;

    fn create_channel(&self, capacity: usize) -> Option<KernelChannel> {
        let handle = unsafe { xStreamBufferGenericCreate(capacity, 0, PD_TRUE) };
        NonNull::new(handle).map(KernelChannel)
    }

    fn halt(&self) -> ! {
        loop {
            unsafe { vTaskDelete(ptr::null_mut()) };
        }
    }
}

impl ByteChannel for KernelChannel {
    fn send(&self, data: &[u8]) -> usize {
        unsafe {
            xStreamBufferSend(self.0.as_ptr(), data.as_ptr().cast(), data.len(), 0)
        }
    }

    fn receive(&self, buf: &mut [u8]) -> usize {
        unsafe {
            xStreamBufferReceive(
                self.0.as_ptr(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
            )
        }
    }
}

impl fmt::Write for KernelConsole {
    /// `printf` stops at a NUL, so runs between NULs go through `%.*s` and
    /// each NUL through `%c`.
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut result = Ok(());
        cabi::split_at_nul(
            s.as_bytes(),
            |run| match c_int::try_from(run.len()) {
                Ok(len) => unsafe {
                    printf(c"%.*s".as_ptr(), len, run.as_ptr());
                },
                Err(_) => result = Err(fmt::Error),
            },
            || unsafe {
                printf(c"%c".as_ptr(), 0 as c_int);
            },
        );
        result
    }
}

impl RngCore for KernelRng {
    fn next_u32(&mut self) -> u32 {
        unsafe { uxRand() as u32 }
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

static SHIM: Shim<KernelPlatform, KernelConsole, KernelRng> =
    Shim::new(KernelPlatform, KernelConsole, KernelRng, ShimConfig::BUILT);

/// FreeRTOS+TCP's hook for TCP initial sequence numbers. Addresses and
/// ports arrive in network byte order.
#[no_mangle]
pub extern "C" fn ulApplicationGetNextSequenceNumber(
    src_addr: u32,
    src_port: u16,
    dst_addr: u32,
    dst_port: u16,
) -> u32 {
    cabi::next_sequence_number(&SHIM, src_addr, src_port, dst_addr, dst_port)
}

/// Variadic in C. Nothing past `flags` is ever read, and on the targets we
/// build for the fixed arguments are passed the same way either way.
#[no_mangle]
pub extern "C" fn _open(_path: *const c_char, flags: c_int) -> c_int {
    SHIM.open(flags)
}

#[no_mangle]
pub unsafe extern "C" fn _gettimeofday(tv: *mut TimeVal, tz: *mut c_void) -> c_int {
    cabi::gettimeofday(&SHIM, tv, tz)
}

/// `XTIME` for the crypto library. The argument is ignored.
#[no_mangle]
pub extern "C" fn shim_time(_t: *mut time_t) -> time_t {
    SHIM.crypto_time()
}

/// `XREALLOC` for the crypto library.
#[no_mangle]
pub unsafe extern "C" fn shim_realloc(
    block: *mut c_void,
    new_size: usize,
    heap: *mut c_void,
    old_size: c_int,
) -> *mut c_void {
    cabi::realloc(&SHIM, block, new_size, heap, old_size)
}

/// `CUSTOM_RAND_GENERATE_SEED` for the crypto library.
#[no_mangle]
pub unsafe extern "C" fn shim_generate_seed(out: *mut u8, size: u32) -> c_int {
    cabi::generate_seed(&SHIM, out, size)
}

/// Returns 1 if all `len` bytes were sent and 0 otherwise.
#[no_mangle]
pub unsafe extern "C" fn shim_send(data: *const u8, len: usize) -> u8 {
    cabi::send(&SHIM, data, len)
}

#[no_mangle]
pub unsafe extern "C" fn shim_recv(buf: *mut u8, len: usize) -> usize {
    cabi::recv(&SHIM, buf, len)
}

/// Prints a NUL-terminated string, unless the program has exited.
///
/// This is not a `printf`: Rust can't define a C-variadic function, so there
/// is no format string. C callers format into a buffer first (`snprintf`) and
/// pass the result; a `%` in `text` is printed as it is.
#[no_mangle]
pub unsafe extern "C" fn shim_log(text: *const c_char) {
    cabi::log(&SHIM, text)
}

#[no_mangle]
pub extern "C" fn shim_exit(code: u8) {
    SHIM.exit(code);
}

#[cfg(not(any(test, feature = "hosted")))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    SHIM.log(format_args!("FATAL ERROR: {info}\r\n"));
    SHIM.exit(1);
    SHIM.platform().halt()
}
