// mpegcast-core
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared structs, traits, and bit-level primitives for the `mpegcast` streaming core.

pub mod bitbuffer;
pub mod errors;
pub mod units;

pub use bitbuffer::{BitBuffer, BufferMode};
pub use errors::{decode_error, limit_error, unsupported_error, CastError, Result};
