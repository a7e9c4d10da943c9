// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust MPEG-1 video decoder (part of the `mpegcast` streaming core).
//!
//! Decodes I and P pictures to 4:2:0 planar frames. B and D pictures are scanned past without
//! being reconstructed, since display reordering and backward prediction are outside this
//! decoder's scope.

mod decoder;
mod huffman;
mod idct;
mod macroblock;
mod planes;
mod tables;

pub use decoder::{Mpeg1Decoder, DEFAULT_VIDEO_BUFFER_SIZE};
pub use planes::PlaneSet;
pub use tables::PictureType;
