// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time configuration.
//!
//! `build.rs` turns `$SHIM_CONFIG` into constants; [`ShimConfig::BUILT`]
//! gathers them into a value the rest of the crate takes by argument, so tests
//! can hand in their own.

use crate::seed::DEFAULT_SEEDS;

mod built {
    include!(concat!(env!("OUT_DIR"), "/shim_config.rs"));
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShimConfig {
    /// Seconds since the epoch reported by every clock query. `None` means
    /// the image was built without one, which is fatal at the first query.
    pub fixed_time: Option<i64>,
    /// Seed bytes, served one per call and then repeated. Never empty.
    pub seeds: &'static [u8],
    /// Capacity of the message channel in bytes.
    pub channel_capacity: usize,
    /// Allocator argument that marks a realloc call as carrying the old
    /// block's size.
    pub realloc_tag: usize,
}

impl ShimConfig {
    pub const BUILT: Self = Self {
        fixed_time: built::FIXED_TIME,
        seeds: match built::SEEDS {
            Some(s) => s,
            None => DEFAULT_SEEDS,
        },
        channel_capacity: built::CHANNEL_CAPACITY,
        realloc_tag: built::REALLOC_TAG,
    };
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self::BUILT
    }
}
