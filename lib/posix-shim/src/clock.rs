// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A clock stopped at a build-time instant.
//!
//! Certificate checks want to know the date, and there is nothing on the
//! target to ask. Both entry points report the same configured second, with
//! zero microseconds.

use core::ffi::c_long;
use core::fmt::Write;
use static_assertions::{assert_eq_size, const_assert_eq};

use crate::diag::{log_line, Diag};
use crate::error::{ClockQuery, Fatal};

#[allow(non_camel_case_types)]
pub type time_t = i64;

/// `struct timeval` as the C library lays it out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TimeVal {
    pub tv_sec: time_t,
    pub tv_usec: c_long,
}

// `long` is 4 or 8 bytes depending on the target; the struct is 16 either way.
assert_eq_size!(TimeVal, [u64; 2]);
const_assert_eq!(core::mem::offset_of!(TimeVal, tv_usec), 8);

#[derive(Copy, Clone, Debug)]
pub struct FixedClock {
    seconds: Option<time_t>,
}

impl FixedClock {
    pub const fn new(seconds: Option<time_t>) -> Self {
        Self { seconds }
    }

    /// `gettimeofday`: fills in `out`. A timezone argument is ignored, with a
    /// warning.
    pub fn wall_clock<C: Write>(
        &self,
        diag: &Diag<C>,
        out: Option<&mut TimeVal>,
        tz_supplied: bool,
    ) -> Result<(), Fatal> {
        if tz_supplied {
            log_line!(
                diag,
                "Warning: timezone pointer is not NULL in custom <gettimeofday>."
            );
        }
        let out = out.ok_or(Fatal::MissingTimeval)?;
        let seconds = self
            .seconds
            .ok_or(Fatal::TimeNotConfigured(ClockQuery::WallClock))?;
        *out = TimeVal {
            tv_sec: seconds,
            tv_usec: 0,
        };
        Ok(())
    }

    /// `time`, as the crypto library calls it.
    pub fn crypto_time(&self) -> Result<time_t, Fatal> {
        self.seconds
            .ok_or(Fatal::TimeNotConfigured(ClockQuery::CryptoClock))
    }
}
