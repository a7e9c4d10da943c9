// mpegcast-core
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared timing units.
//!
//! MPEG-TS timestamps are 33-bit values in 90 kHz units. A `u32` cannot hold the accumulated
//! value while it is being assembled bit-by-bit from the stream, so every accumulator here uses a
//! `u64`; the division to seconds, and therefore the loss of integer precision, happens only once,
//! at the boundary where the value is handed to the rest of the system.

/// The clock rate Presentation Timestamps are expressed in.
pub const PTS_TIMEBASE_HZ: u64 = 90_000;

/// Converts a 33-bit PTS value to seconds.
pub fn pts_to_seconds(pts: u64) -> f64 {
    pts as f64 / PTS_TIMEBASE_HZ as f64
}
