// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers for `build.rs` scripts in this workspace.
//!
//! Configuration reaches a build script as TOML text in an environment
//! variable. The shim's knobs (fixed time of day, seed bytes, channel capacity
//! and so on) are all build-time constants, because the target has nowhere to
//! read them from at run time.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::path::PathBuf;

/// Name of the variable carrying the shim configuration.
pub const SHIM_CONFIG_VAR: &str = "SHIM_CONFIG";

/// Returns `OUT_DIR` as a path. Only meaningful inside a build script.
pub fn out_dir() -> PathBuf {
    PathBuf::from(env::var_os("OUT_DIR").unwrap_or_default())
}

/// Reads an environment variable and asks cargo to rebuild if it changes.
pub fn env_var(var: &str) -> Result<String> {
    println!("cargo:rerun-if-env-changed={}", var);
    env::var(var).with_context(|| format!("reading ${var}"))
}

///
/// Pulls the shim configuration for purposes of a build script. This will fail
/// if `$SHIM_CONFIG` is unset or doesn't parse. As with any serde target, `T`
/// should describe only the parts of the configuration the caller cares about;
/// optional fields should be `Option`s.
///
pub fn config<T: DeserializeOwned>() -> Result<T> {
    toml_from_env(SHIM_CONFIG_VAR)
}

/// Equivalent to `config` but uses `T::default()` if the environment variable
/// is missing. If the environment variable fails to parse, this still fails
/// with `Err`.
pub fn config_or_default<T: DeserializeOwned + Default>() -> Result<T> {
    toml_from_env_def(SHIM_CONFIG_VAR)
}

fn toml_from_env<T: DeserializeOwned>(var: &str) -> Result<T> {
    let config = env_var(var)?;
    println!("--- toml for ${} ---", var);
    println!("{}", config);
    parse(var, &config)
}

fn toml_from_env_def<T: DeserializeOwned + Default>(var: &str) -> Result<T> {
    // Emitted whether or not the variable is present, so that we get re-run
    // if it shows up later.
    match env_var(var) {
        Ok(text) => {
            println!("--- toml for ${} ---", var);
            println!("{}", text);
            parse(var, &text)
        }
        Err(_) => {
            println!("--- var ${} not present, using default ---", var);
            Ok(T::default())
        }
    }
}

fn parse<T: DeserializeOwned>(var: &str, text: &str) -> Result<T> {
    toml::from_str(text).with_context(|| format!("parsing ${var} as TOML"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Default, Debug, PartialEq)]
    #[serde(rename_all = "kebab-case")]
    struct Knobs {
        fixed_time: Option<u64>,
        seeds: Option<Vec<u8>>,
    }

    #[test]
    fn parses_kebab_case_fields() {
        let k: Knobs =
            parse("TEST", "fixed-time = 1600000000\nseeds = [1, 2, 3]\n")
                .unwrap();
        assert_eq!(k.fixed_time, Some(1_600_000_000));
        assert_eq!(k.seeds, Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_fields_stay_empty() {
        let k: Knobs = parse("TEST", "").unwrap();
        assert_eq!(k, Knobs::default());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse::<Knobs>("TEST", "fixed-time = \"soon\"").is_err());
    }
}
