// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP initial sequence numbers.

use core::net::SocketAddrV4;
use rand_core::RngCore;

/// Picks the initial sequence number for a new connection. The endpoints are
/// what RFC 6528 would hash; here they are ignored and the number comes
/// straight from the platform's pseudo-random source.
// TODO: hash the four-tuple with a boot secret (RFC 6528) once the platform
// has a real entropy source to draw the secret from.
pub fn next_initial_sequence_number<R: RngCore>(
    rng: &mut R,
    _src: SocketAddrV4,
    _dst: SocketAddrV4,
) -> u32 {
    rng.next_u32()
}
