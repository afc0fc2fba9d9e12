// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

/// A fixed-capacity circular byte queue.
///
/// A `CircQ` over `n` bytes of backing storage holds up to `n` bytes in FIFO
/// order. Writes are all-or-nothing: a block that doesn't fit in the free
/// space is refused without touching what is already queued. Reads take as
/// many bytes as are available, up to the size of the destination.
///
/// Chunk boundaries are not recorded, so enqueue and dequeue sizes don't have
/// to match; this is a byte stream, not a message queue.
///
/// The storage type is left open (`[u8; N]`, `&mut [u8]`, `Vec<u8>` all work)
/// so the same queue can live in a `static` on the target or on the heap of a
/// host test.
///
/// Non-goals:
///
/// - Concurrent access. The queue must always be accessed using `&mut`;
///   whoever shares it supplies the exclusion.
/// - Growing. Capacity is whatever the storage was at construction.
#[derive(Debug)]
pub struct CircQ<B> {
    backing: B,
    head: usize,
    tail: usize,
    available: usize,
}

/// Error returned when the queue is too full to accommodate a block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueFull {
    /// Free space at the time of the refusal.
    pub free: usize,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> CircQ<B> {
    /// Creates an empty queue over `backing`.
    pub const fn new(backing: B) -> Self {
        Self {
            backing,
            head: 0,
            tail: 0,
            available: 0,
        }
    }

    /// Total number of bytes the queue can hold.
    pub fn capacity(&self) -> usize {
        self.backing.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Returns the number of bytes that have been enqueued but not yet
    /// dequeued.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Returns the number of bytes that can be enqueued without needing to
    /// dequeue more data.
    pub fn free(&self) -> usize {
        self.capacity() - self.available
    }

    /// Enqueues all of `data`, or nothing.
    pub fn enqueue(&mut self, data: &[u8]) -> Result<(), QueueFull> {
        if data.len() > self.free() {
            return Err(QueueFull { free: self.free() });
        }

        let cap = self.capacity();
        let (first, second) =
            region_mut(self.backing.as_mut(), data.len(), self.head);
        let (d1, d2) = data.split_at(first.len());
        first.copy_from_slice(d1);
        second.copy_from_slice(d2);

        self.head = circular_add(self.head, data.len(), cap);
        self.available += data.len();
        Ok(())
    }

    /// Dequeues up to `dest.len()` bytes into `dest`, returning how many were
    /// copied. Zero means the queue was empty (or `dest` was).
    pub fn dequeue_into(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.available);
        if n == 0 {
            return 0;
        }

        let cap = self.capacity();
        let (first, second) = region_mut(self.backing.as_mut(), n, self.tail);
        let (d1, d2) = dest[..n].split_at_mut(first.len());
        d1.copy_from_slice(first);
        d2.copy_from_slice(second);

        self.tail = circular_add(self.tail, n, cap);
        self.available -= n;
        n
    }
}

/// Finds the (possibly discontiguous) `n` bytes starting at `from`, wrapping
/// at the end of `backing`. The first slice runs from `from` toward the end of
/// memory; the second, possibly empty, starts at the base.
///
/// Callers check `n` against free/available space first.
fn region_mut(
    backing: &mut [u8],
    n: usize,
    from: usize,
) -> (&mut [u8], &mut [u8]) {
    let first_len = (backing.len() - from).min(n);
    let second_len = n - first_len;

    let (second_plus, first_plus) = backing.split_at_mut(from);
    (&mut first_plus[..first_len], &mut second_plus[..second_len])
}

/// Circular arithmetic without assuming hardware divide.
fn circular_add(a: usize, b: usize, limit: usize) -> usize {
    let n = a + b;
    // This slightly weird formulation avoids generating an overflow panic that
    // the compiler would have to optimize away.
    n.checked_sub(limit).unwrap_or(n)
}
