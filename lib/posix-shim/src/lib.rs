// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! POSIX platform shim for a bare real-time kernel.
//!
//! A TCP/IP stack and a TLS library written against libc expect a handful of
//! things a bare kernel doesn't have: a filesystem, a wall clock, an entropy
//! source, `realloc`, and somewhere to push bytes between tasks. This crate
//! supplies just enough of each for those libraries to run unmodified:
//!
//! - [`transport`]: a lazily created single-producer/single-consumer byte
//!   channel with zero-timeout send and receive;
//! - [`realloc`]: resize on top of an allocate/free-only heap, in a bounded
//!   flavor and a legacy flavor that trusts the caller;
//! - [`clock`], [`seed`] and [`isn`]: deterministic time, seed bytes and TCP
//!   initial sequence numbers;
//! - [`fs`]: a trap for `open`, which must never be reached;
//! - [`diag`]: the console, gated by a one-way shutdown latch.
//!
//! [`Shim`] ties them together and [`cabi`] puts the C calling conventions in
//! front of it. The kernel itself sits behind the traits in [`platform`]; the
//! `freertos` feature binds them to FreeRTOS and exports the C symbols, which
//! `app/freertos-shim` packages as a static library.

#![cfg_attr(not(any(test, feature = "hosted")), no_std)]

pub mod cabi;
pub mod clock;
pub mod config;
pub mod diag;
pub mod error;
pub mod fs;
pub mod isn;
pub mod platform;
pub mod realloc;
pub mod seed;
pub mod shim;
pub mod transport;

#[cfg(any(test, feature = "hosted"))]
pub mod hosted;

// The kernel symbols only resolve in a target image.
#[cfg(all(feature = "freertos", not(test)))]
mod ffi;

#[cfg(test)]
mod tests;

pub use config::ShimConfig;
pub use diag::Diag;
pub use error::{Fatal, TransportError};
pub use platform::{ByteChannel, Heap, Platform};
pub use shim::Shim;
