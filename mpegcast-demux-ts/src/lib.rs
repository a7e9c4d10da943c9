// mpegcast-demux-ts
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust MPEG-2 Transport Stream demuxer (part of the `mpegcast` streaming core).

mod demuxer;
mod pes;

pub use demuxer::{TsDemuxer, AUDIO_STREAM_ID, VIDEO_STREAM_ID};
pub use pes::PesSink;
