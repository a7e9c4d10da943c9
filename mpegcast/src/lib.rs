// mpegcast
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # mpegcast
//!
//! mpegcast is a pure Rust streaming media decoding engine: an MPEG-2 Transport Stream
//! demuxer, an MPEG-1 video decoder, an MPEG Audio Layer II decoder, a BGRX-to-YUV color
//! conversion and scaling core, and a cooperative playback scheduler that ties them together.
//!
//! This crate is a facade over the workspace's member crates. The core bit-buffer and error
//! types and the transport-stream demuxer are always present; the decoders, color converter,
//! and player are enabled via feature flags.
//!
//! | Subsystem                   | Feature Flag | Default |
//! |-----------------------------|--------------|---------|
//! | MPEG-1 video decoder        | `mpeg1`      | Yes     |
//! | MPEG Audio Layer II decoder | `mp2`        | Yes     |
//! | Color conversion & scaling  | `color`      | Yes     |
//! | Playback scheduler          | `player`     | Yes     |
//!
//! # Usage
//!
//! For straight decoding, write transport-stream bytes into a
//! [`TsDemuxer`][demux::TsDemuxer] wired to an [`Mpeg1Decoder`][mpeg1::Mpeg1Decoder] and an
//! [`Mp2Decoder`][mp2::Mp2Decoder], then call each decoder's `decode` until it reports that it
//! needs more data. For scheduled playback against a clock, implement the
//! [`Source`][player::Source], [`Renderer`][player::Renderer], and
//! [`AudioOutput`][player::AudioOutput] traits for your I/O and hand them to a
//! [`Player`][player::Player]. An example end-to-end player (mpegcast-play) lives in this
//! repository.

pub use mpegcast_core as core;
pub use mpegcast_demux_ts as demux;

#[cfg(feature = "mpeg1")]
pub use mpegcast_codec_mpeg1 as mpeg1;

#[cfg(feature = "mp2")]
pub use mpegcast_codec_mp2 as mp2;

#[cfg(feature = "color")]
pub use mpegcast_color as color;

#[cfg(feature = "player")]
pub use mpegcast_player as player;
