// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static trace ring buffers.
//!
//! A ring buffer keeps the last `N` events recorded at some site, together
//! with the source line that recorded them. It is meant to be read out of a
//! stopped target with a debugger, so it keeps working when nothing else can
//! report anything (for instance after the console has been silenced by a
//! shutdown).
//!
//! ## Constraints
//!
//! The payload type must implement both `Copy` and `PartialEq`.
//!
//! If you use the variants of the macros that leave the name implicit, you can
//! only have one ring per module. Provide a name to lift this.
//!
//! ## Creating and filling a ring buffer
//!
//! ```
//! # use ringbuf::*;
//! #[derive(Copy, Clone, Debug, PartialEq)]
//! enum Trace {
//!     None,
//!     Sent(usize),
//! }
//!
//! ringbuf!(Trace, 16, Trace::None);
//!
//! ringbuf_entry!(Trace::Sent(12));
//! ```
//!
//! Recording the same payload from the same line twice in a row bumps the
//! `count` of the existing entry instead of consuming a new slot.
//!
//! ## Reading one with GDB
//!
//! ```console
//! (gdb) set print pretty on
//! (gdb) print posix_shim::transport::__RINGBUF
//! ```
//!
//! Recording never blocks. If the ring is already being written (an interrupt
//! landing in the middle of another entry, say), the new entry is dropped.

#![cfg_attr(not(test), no_std)]

/// Declares a ringbuffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ringbuffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The resulting ringbuffer will be static, so `NAME` should be uppercase and
/// end in `RINGBUF`. If you omit the name, it defaults to `__RINGBUF`.
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::Ringbuf<$t, $n> = $crate::Ringbuf::new($init);
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Inserts data into a named ringbuffer (which should have been declared with
/// the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ringbuffer called
/// `NAME`. Without a name, `__RINGBUF` is used.
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other, by evaluating them in a tuple where each cannot
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

/// A single ring buffer entry. `count` is the number of identical
/// back-to-back recordings folded into it; `generation` goes up by one each
/// time the slot is reused.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

#[derive(Debug)]
struct Entries<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [RingbufEntry<T>; N],
}

/// A ring buffer of parametrized type and size. In practice you want the
/// [`ringbuf!`] macro rather than this directly.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    entries: spin::Mutex<Entries<T, N>>,
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            entries: spin::Mutex::new(Entries {
                last: None,
                buffer: [RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: init,
                }; N],
            }),
        }
    }

    /// Records `payload` as coming from `line`.
    pub fn entry(&self, line: u16, payload: T) {
        if let Some(mut entries) = self.entries.try_lock() {
            entries.record(line, payload);
        }
    }

    /// Returns the most recent entry, if anything has been recorded.
    pub fn last_entry(&self) -> Option<RingbufEntry<T>> {
        let entries = self.entries.lock();
        entries.last.and_then(|i| entries.buffer.get(i).copied())
    }

    /// Calls `f` on each live entry, oldest first.
    pub fn for_each(&self, mut f: impl FnMut(&RingbufEntry<T>)) {
        let entries = self.entries.lock();
        let Some(last) = entries.last else {
            return;
        };
        let start = last + 1;
        for i in (start..N).chain(0..start) {
            let ent = &entries.buffer[i];
            if ent.count != 0 {
                f(ent);
            }
        }
    }
}

impl<T: Copy + PartialEq, const N: usize> Entries<T, N> {
    fn record(&mut self, line: u16, payload: T) {
        // With nothing recorded yet, treat `last` as out of range so the
        // first entry lands in slot 0 and never bumps a count.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Compare-and-reset rather than remainder; our targets don't all have
        // a hardware divide, and this turns usize::MAX into 0 for free.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }
}
