// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constant tables used by the bitstream parser: zig-zag scan order, default quantization
//! matrices, and the frame rate lookup.

/// Maps zig-zag scan position to raster position within an 8x8 block.
pub const ZIG_ZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Default intra quantization matrix, in raster (not zig-zag) order.
pub const DEFAULT_INTRA_QUANT_MATRIX: [u8; 64] = [
    8, 16, 19, 22, 26, 27, 29, 34, 16, 16, 22, 24, 27, 29, 34, 37, 19, 22, 26, 27, 29, 34, 34, 38,
    22, 22, 26, 27, 29, 34, 37, 40, 22, 26, 27, 29, 32, 35, 40, 48, 26, 27, 29, 32, 35, 40, 48, 58,
    26, 27, 29, 34, 38, 46, 56, 69, 27, 29, 35, 38, 46, 56, 69, 83,
];

/// Default non-intra quantization matrix: flat, per the standard.
pub const DEFAULT_NON_INTRA_QUANT_MATRIX: [u8; 64] = [16; 64];

/// `frame_rate_code` (1..=8) to frames per second; index 0 and 9..=15 are reserved.
pub const FRAME_RATE_TABLE: [f64; 16] = [
    0.0, 24000.0 / 1001.0, 24.0, 25.0, 30000.0 / 1001.0, 30.0, 50.0, 60000.0 / 1001.0, 60.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

pub const PICTURE_START_CODE: u8 = 0x00;
pub const SEQUENCE_HEADER_CODE: u8 = 0xB3;
pub const SEQUENCE_END_CODE: u8 = 0xB7;
pub const GROUP_START_CODE: u8 = 0xB8;
pub const EXTENSION_START_CODE: u8 = 0xB5;
pub const SLICE_START_CODE_MIN: u8 = 0x01;
pub const SLICE_START_CODE_MAX: u8 = 0xAF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    Intra,
    Predicted,
    Bidirectional,
    Dc,
}

impl PictureType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(PictureType::Intra),
            2 => Some(PictureType::Predicted),
            3 => Some(PictureType::Bidirectional),
            4 => Some(PictureType::Dc),
            _ => None,
        }
    }
}
