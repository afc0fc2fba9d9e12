// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What the shim needs from the kernel underneath it.
//!
//! The console is any [`core::fmt::Write`] and the pseudo-random source any
//! [`rand_core::RngCore`]; those need no traits of their own.

use core::ptr::NonNull;

/// An allocate/free heap with no notion of resizing and no record of block
/// sizes.
pub trait Heap {
    /// Allocates `size` bytes, or returns `None` if the heap is exhausted.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Returns a block to the heap.
    ///
    /// # Safety
    ///
    /// `block` must have come from `allocate` on this heap and must not be
    /// used afterwards.
    unsafe fn free(&self, block: NonNull<u8>);
}

/// A fixed-capacity byte channel. Both operations return immediately.
pub trait ByteChannel {
    /// Writes as much of `data` as the channel will take and returns how much
    /// that was. A channel that keeps message boundaries takes all or
    /// nothing.
    fn send(&self, data: &[u8]) -> usize;

    /// Reads up to `buf.len()` bytes and returns how many were copied.
    fn receive(&self, buf: &mut [u8]) -> usize;
}

pub trait Platform: Heap {
    type Channel: ByteChannel;

    /// Creates a channel of `capacity` bytes, or `None` if the kernel can't.
    fn create_channel(&self, capacity: usize) -> Option<Self::Channel>;

    /// Stops the calling context for good. Reached only after the exit
    /// banner has been printed.
    fn halt(&self) -> !;
}
