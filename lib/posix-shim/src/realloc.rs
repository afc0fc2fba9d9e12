// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `realloc` for a heap that can only allocate and free.
//!
//! The heap doesn't know how big a block is, so whoever asks for a resize has
//! to. [`resize_bounded`] takes the old size from the caller and never copies
//! past it. [`resize_unbounded`] is for callers that can't say: it copies
//! `new_size` bytes out of the old block whatever its real size, and logs a
//! warning every time it is used.
//!
//! Both share the `realloc` edge cases: a zero size frees the block and yields
//! nothing, and a missing block is a plain allocation (which, like `malloc`,
//! may come back empty). Running out of memory while moving an existing block
//! is fatal, since the caller would be left holding a block it believes was
//! resized.

use core::fmt::Write;
use core::ptr::{self, NonNull};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::diag::{log_line, Diag};
use crate::error::Fatal;
use crate::platform::Heap;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Freed,
    Fresh(usize),
    Bounded { old_size: usize, new_size: usize },
    Unbounded(usize),
    OutOfMemory(usize),
}

ringbuf!(Trace, 16, Trace::None);

enum Step {
    Done(Option<NonNull<u8>>),
    Move(NonNull<u8>),
}

/// Deals with the cases that don't need a copy.
///
/// # Safety
///
/// `block`, if present, must be a live allocation from `heap`.
unsafe fn first_step<H: Heap>(
    heap: &H,
    block: Option<NonNull<u8>>,
    new_size: usize,
) -> Step {
    if new_size == 0 {
        if let Some(b) = block {
            heap.free(b);
            ringbuf_entry!(Trace::Freed);
        }
        return Step::Done(None);
    }
    match block {
        None => {
            ringbuf_entry!(Trace::Fresh(new_size));
            Step::Done(heap.allocate(new_size))
        }
        Some(b) => Step::Move(b),
    }
}

/// Moves `copy_len` bytes of `old` into a fresh `new_size` block and frees
/// `old`. If the allocation fails, `old` is left alone.
///
/// # Safety
///
/// `old` must be a live allocation from `heap` that is readable for
/// `copy_len` bytes, and `copy_len <= new_size`.
unsafe fn relocate<H: Heap>(
    heap: &H,
    old: NonNull<u8>,
    new_size: usize,
    copy_len: usize,
) -> Result<NonNull<u8>, Fatal> {
    let Some(new) = heap.allocate(new_size) else {
        ringbuf_entry!(Trace::OutOfMemory(new_size));
        return Err(Fatal::OutOfMemory);
    };
    ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), copy_len);
    heap.free(old);
    Ok(new)
}

/// Resizes `block` to `new_size` bytes, carrying over at most `old_size`
/// bytes of its contents.
///
/// # Safety
///
/// `block`, if present, must be a live allocation from `heap` of at least
/// `old_size` bytes. On success it has been freed and must not be used again.
pub unsafe fn resize_bounded<H: Heap>(
    heap: &H,
    block: Option<NonNull<u8>>,
    new_size: usize,
    old_size: usize,
) -> Result<Option<NonNull<u8>>, Fatal> {
    let old = match first_step(heap, block, new_size) {
        Step::Done(b) => return Ok(b),
        Step::Move(b) => b,
    };
    ringbuf_entry!(Trace::Bounded { old_size, new_size });
    relocate(heap, old, new_size, usize::min(old_size, new_size)).map(Some)
}

/// Resizes `block` to `new_size` bytes, copying `new_size` bytes out of it.
///
/// # Safety
///
/// `block`, if present, must be a live allocation from `heap` and readable
/// for `new_size` bytes. Nothing here can check that: growing a block through
/// this function reads past its end. On success the block has been freed and
/// must not be used again.
pub unsafe fn resize_unbounded<H: Heap, C: Write>(
    heap: &H,
    diag: &Diag<C>,
    block: Option<NonNull<u8>>,
    new_size: usize,
) -> Result<Option<NonNull<u8>>, Fatal> {
    let old = match first_step(heap, block, new_size) {
        Step::Done(b) => return Ok(b),
        Step::Move(b) => b,
    };
    ringbuf_entry!(Trace::Unbounded(new_size));
    log_line!(diag, "Warning: realloc without the old size is used.");
    relocate(heap, old, new_size, new_size).map(Some)
}
