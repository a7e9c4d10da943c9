// mpegcast-codec-mp2
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust MPEG-1 Audio Layer II decoder (part of the `mpegcast` streaming core).
//!
//! Produces 1152 interleaved-free stereo PCM samples per frame via bit allocation, scale-factor
//! reconstruction, sample dequantization and 32-subband polyphase synthesis.

mod decoder;
mod synthesis;
mod tables;

pub use decoder::{AudioFrame, Mp2Decoder, DEFAULT_AUDIO_BUFFER_SIZE};
