// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::Write;

/// The knobs a build may set through `$SHIM_CONFIG`. Everything is optional;
/// a missing fixed time is only an error once something asks for the time.
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ShimBuildConfig {
    /// Seconds since the epoch reported by both clock entry points.
    fixed_time: Option<u64>,
    /// Bytes handed out, one per call, in place of entropy.
    seeds: Option<Vec<u8>>,
    /// Size of the message channel, in bytes.
    channel_capacity: Option<usize>,
    /// Allocator tag that marks a realloc call as carrying the old size.
    realloc_tag: Option<usize>,
}

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_REALLOC_TAG: usize = 0x5afe;

fn main() -> Result<()> {
    let cfg = build_util::config_or_default::<ShimBuildConfig>()?;

    let fixed_time = match cfg.fixed_time {
        Some(t) if t > i64::MAX as u64 => {
            bail!("fixed-time {t} does not fit in a 64-bit time_t")
        }
        Some(t) => format!("Some({t})"),
        None => "None".to_string(),
    };

    let seeds = match &cfg.seeds {
        Some(s) if s.is_empty() => {
            bail!("seeds must list at least one byte (or be left out)")
        }
        Some(s) => format!("Some(&{s:?})"),
        None => "None".to_string(),
    };

    let capacity = cfg.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
    if capacity == 0 {
        bail!("channel-capacity must be non-zero");
    }

    let realloc_tag = cfg.realloc_tag.unwrap_or(DEFAULT_REALLOC_TAG);
    if realloc_tag == 0 {
        // A null allocator argument is what every unmodified call site
        // passes; it can't also mean "old size attached".
        bail!("realloc-tag must be non-zero");
    }

    let out = build_util::out_dir();
    let mut file = File::create(out.join("shim_config.rs"))?;
    writeln!(file, "pub const FIXED_TIME: Option<i64> = {fixed_time};")?;
    writeln!(file, "pub const SEEDS: Option<&[u8]> = {seeds};")?;
    writeln!(file, "pub const CHANNEL_CAPACITY: usize = {capacity};")?;
    writeln!(file, "pub const REALLOC_TAG: usize = {realloc_tag:#x};")?;

    Ok(())
}
