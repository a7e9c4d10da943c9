// mpegcast-core
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the error type shared by every crate in the workspace.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `CastError` enumerates every way a bitstream operation can fail.
///
/// Stream-data errors (`Decode`, `Unsupported`) are expected during normal operation on
/// real-world streams (resync, corrupt frames) and are handled by the caller rather than
/// aborting the pipeline. `Limit` and `Io` are treated as fatal by the player.
#[derive(Debug)]
pub enum CastError {
    /// The bitstream was well-formed up to this point, but the data that follows does not match
    /// the expected grammar (bad start code, reserved header field, impossible combination).
    Decode(&'static str),
    /// A feature of the bitstream is recognized but intentionally not implemented.
    Unsupported(&'static str),
    /// A configured resource limit (e.g. the `BitBuffer` growth cap) was reached.
    Limit(&'static str),
    /// An I/O error occurred while reading from a `Source`.
    Io(Box<dyn StdError + Send + Sync>),
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastError::Decode(msg) => write!(f, "malformed stream: {msg}"),
            CastError::Unsupported(feature) => write!(f, "unsupported: {feature}"),
            CastError::Limit(constraint) => write!(f, "limit reached: {constraint}"),
            CastError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl StdError for CastError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CastError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CastError {
    fn from(err: std::io::Error) -> Self {
        CastError::Io(Box::new(err))
    }
}

/// The result type returned by every fallible operation in the mpegcast workspace.
pub type Result<T> = result::Result<T, CastError>;

/// Convenience constructor for a decode error.
pub fn decode_error<T>(msg: &'static str) -> Result<T> {
    Err(CastError::Decode(msg))
}

/// Convenience constructor for an unsupported-feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(CastError::Unsupported(feature))
}

/// Convenience constructor for a resource-limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(CastError::Limit(constraint))
}
