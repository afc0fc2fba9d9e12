// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seed bytes for the crypto library's DRBG, from a fixed list.
//!
//! This is not entropy. It exists so the library can be brought up on a
//! target that has none; every boot sees the same sequence.

use core::sync::atomic::{AtomicUsize, Ordering};
use ringbuf::{ringbuf, ringbuf_entry};

/// Used when the build doesn't supply its own list.
pub const DEFAULT_SEEDS: &[u8] = &[4, 7, 234, 65, 23, 12, 78, 44, 98, 234];

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Served { index: usize, byte: u8 },
}

ringbuf!(Trace, 16, Trace::None);

/// Position in the seed list. Takes no lock: the index moves with a
/// compare-and-swap, so a caller preempted mid-call never holds up another.
#[derive(Debug)]
pub struct SeedCursor {
    seeds: &'static [u8],
    next: AtomicUsize,
}

impl SeedCursor {
    /// Starts at the first byte of `seeds`. An empty list means
    /// [`DEFAULT_SEEDS`].
    pub const fn new(seeds: &'static [u8]) -> Self {
        let seeds = if seeds.is_empty() { DEFAULT_SEEDS } else { seeds };
        Self {
            seeds,
            next: AtomicUsize::new(0),
        }
    }

    /// Hands out the current byte and moves on, wrapping at the end.
    pub fn next_byte(&self) -> u8 {
        let len = self.seeds.len();
        let step = |i: usize| Some(if i + 1 >= len { 0 } else { i + 1 });
        let index = match self.next.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            step,
        ) {
            Ok(i) | Err(i) => i,
        };
        let byte = self.seeds[index];
        ringbuf_entry!(Trace::Served { index, byte });
        byte
    }

    /// Writes one seed byte into the start of `out`, whatever its length.
    /// The cursor advances by one even when `out` is empty.
    pub fn generate(&self, out: &mut [u8]) {
        let byte = self.next_byte();
        if let Some(first) = out.first_mut() {
            *first = byte;
        }
    }
}
