// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static library of the POSIX shim for a FreeRTOS image. The symbols come
//! from `posix-shim`'s `freertos` feature; this crate only gives them an
//! archive to live in.

#![no_std]

extern crate posix_shim;
