// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Why a transport operation didn't move the bytes asked of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing has been sent yet, so there is no channel to read from.
    NotOpen,
    /// The kernel couldn't create the channel. The next send tries again.
    CreateFailed,
    /// The channel took fewer bytes than offered.
    ShortWrite { sent: usize, wanted: usize },
}

/// Which clock entry point found the fixed time missing. The two report it
/// with different exit codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockQuery {
    WallClock,
    CryptoClock,
}

/// Failures that a caller's signature gives it no way to hear about. Each
/// one ends the program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fatal {
    /// Something tried to open a file.
    FileOpen,
    /// `gettimeofday` was handed nowhere to put the answer.
    MissingTimeval,
    /// The image was built without a fixed time of day.
    TimeNotConfigured(ClockQuery),
    /// The heap couldn't satisfy a resize.
    OutOfMemory,
}

impl Fatal {
    /// Exit code reported in the exit banner: 1 when a caller broke the
    /// contract, 2 when the build or the heap let us down.
    pub fn exit_code(self) -> u8 {
        match self {
            Fatal::FileOpen
            | Fatal::MissingTimeval
            | Fatal::TimeNotConfigured(ClockQuery::WallClock) => 1,
            Fatal::TimeNotConfigured(ClockQuery::CryptoClock)
            | Fatal::OutOfMemory => 2,
        }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::FileOpen => {
                f.write_str("FATAL ERROR: <open> should never be called.")
            }
            Fatal::MissingTimeval => {
                f.write_str("<INVALID> No timeval allocated in <gettimeofday>.")
            }
            Fatal::TimeNotConfigured(ClockQuery::WallClock) => f.write_str(
                "<INVALID> [gettimeofday]: no fixed time was configured!",
            ),
            Fatal::TimeNotConfigured(ClockQuery::CryptoClock) => {
                f.write_str("<INVALID> [time]: no fixed time was configured!")
            }
            Fatal::OutOfMemory => {
                f.write_str("<INVALID> [realloc]: Failed to malloc.")
            }
        }
    }
}
