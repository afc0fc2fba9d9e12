// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A platform made of `std` parts, for running the shim on a host.
//!
//! The heap keeps track of what it handed out, fills new blocks with
//! [`POISON`] so stray copies show up, and can be told to fail. Channels are
//! [`CircQ`]s. The console collects everything written to it, and halting
//! panics, so a test can catch it.

use circq::CircQ;
use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;
use std::alloc::{self, Layout};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::platform::{ByteChannel, Heap, Platform};

/// Fill byte for freshly allocated host blocks.
pub const POISON: u8 = 0xa5;

const ALIGN: usize = 8;

/// A console that keeps what it is given. Clones share the same text.
#[derive(Clone, Default)]
pub struct CaptureConsole(Arc<Mutex<String>>);

impl CaptureConsole {
    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }
}

impl fmt::Write for CaptureConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.lock().push_str(s);
        Ok(())
    }
}

/// A byte channel over a [`CircQ`]: sends go in whole or not at all.
pub struct HostChannel {
    queue: Mutex<CircQ<Vec<u8>>>,
}

impl HostChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(CircQ::new(vec![0; capacity])),
        }
    }
}

impl ByteChannel for HostChannel {
    fn send(&self, data: &[u8]) -> usize {
        match self.queue.lock().enqueue(data) {
            Ok(()) => data.len(),
            Err(_) => 0,
        }
    }

    fn receive(&self, buf: &mut [u8]) -> usize {
        self.queue.lock().dequeue_into(buf)
    }
}

#[derive(Default)]
pub struct HostHeap {
    /// Live blocks, by address, with their sizes.
    blocks: Mutex<BTreeMap<usize, usize>>,
    fail_next: AtomicBool,
}

impl HostHeap {
    /// Makes the next allocation fail.
    pub fn fail_next_allocation(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn size_of(&self, block: NonNull<u8>) -> Option<usize> {
        self.blocks.lock().get(&(block.as_ptr() as usize)).copied()
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.lock().len()
    }

    fn layout(size: usize) -> Layout {
        // Zero-sized allocations aren't allowed by `std::alloc`.
        match Layout::from_size_align(size.max(1), ALIGN) {
            Ok(l) => l,
            Err(_) => panic!("no layout for a {size}-byte block"),
        }
    }
}

impl Heap for HostHeap {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return None;
        }
        let layout = Self::layout(size);
        // Safety: the layout has a non-zero size.
        let block = NonNull::new(unsafe { alloc::alloc(layout) })?;
        unsafe { block.as_ptr().write_bytes(POISON, size) };
        self.blocks.lock().insert(block.as_ptr() as usize, size);
        Some(block)
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        let Some(size) = self.blocks.lock().remove(&(block.as_ptr() as usize))
        else {
            panic!("free of {block:p}, which this heap never handed out");
        };
        alloc::dealloc(block.as_ptr(), Self::layout(size));
    }
}

impl Drop for HostHeap {
    fn drop(&mut self) {
        for (addr, size) in core::mem::take(&mut *self.blocks.lock()) {
            unsafe { alloc::dealloc(addr as *mut u8, Self::layout(size)) };
        }
    }
}

#[derive(Default)]
pub struct HostPlatform {
    heap: HostHeap,
    fail_next_channel: AtomicBool,
    channels_created: AtomicUsize,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heap(&self) -> &HostHeap {
        &self.heap
    }

    /// Makes the next channel creation fail.
    pub fn fail_next_channel(&self) {
        self.fail_next_channel.store(true, Ordering::SeqCst);
    }

    pub fn channels_created(&self) -> usize {
        self.channels_created.load(Ordering::SeqCst)
    }
}

impl Heap for HostPlatform {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.heap.allocate(size)
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        self.heap.free(block)
    }
}

impl Platform for HostPlatform {
    type Channel = HostChannel;

    fn create_channel(&self, capacity: usize) -> Option<HostChannel> {
        if self.fail_next_channel.swap(false, Ordering::SeqCst) {
            return None;
        }
        self.channels_created.fetch_add(1, Ordering::SeqCst);
        Some(HostChannel::new(capacity))
    }

    fn halt(&self) -> ! {
        panic!("platform halted");
    }
}
