// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Macroblock and block layer decoding: addressing, motion vectors, coefficients, and
//! reconstruction.

use mpegcast_core::{decode_error, Result};

use crate::decoder::Mpeg1Decoder;
use crate::huffman::{
    unpack, MacroblockType, CODED_BLOCK_PATTERN, DCT_COEFF, DCT_COEFF_ESCAPE, DCT_COEFF_FIRST_OR_EOB,
    DCT_DC_SIZE_CHROMINANCE, DCT_DC_SIZE_LUMINANCE, MACROBLOCK_ADDRESS_INCREMENT, MACROBLOCK_ESCAPE,
    MACROBLOCK_STUFFING, MACROBLOCK_TYPE_I, MACROBLOCK_TYPE_P, MOTION_CODE,
};
use crate::idct::idct_8x8;
use crate::planes::add_residual_block;
use crate::tables::{PictureType, ZIG_ZAG};

impl Mpeg1Decoder {
    pub(crate) fn decode_macroblocks_in_slice(&mut self) -> Result<()> {
        loop {
            if self.bits_mut().next_bytes_are_start_code() || !self.bits_mut().has(8) {
                return Ok(());
            }

            let Some(increment) = self.read_macroblock_address_increment()?
            else {
                return Ok(());
            };

            // `mb_address` starts at `mb_row * mb_width - 1`, so the first increment in a slice
            // naturally lands on the slice's first macroblock; any increment greater than 1, on
            // the first macroblock or later, denotes that many skipped addresses in between.
            for _ in 0..(increment - 1) {
                self.slice.mb_address += 1;
                self.skip_macroblock()?;
            }
            self.slice.mb_address += 1;

            self.decode_one_macroblock()?;
        }
    }

    fn read_macroblock_address_increment(&mut self) -> Result<Option<i32>> {
        let mut increment = 0i32;
        loop {
            let Some(sym) = MACROBLOCK_ADDRESS_INCREMENT.decode(self.bits_mut())
            else {
                return Ok(None);
            };
            if sym == MACROBLOCK_STUFFING {
                continue;
            }
            if sym == MACROBLOCK_ESCAPE {
                increment += 33;
                continue;
            }
            increment += sym;
            return Ok(Some(increment));
        }
    }

    fn mb_xy(&self) -> (usize, usize) {
        let addr = self.slice.mb_address.max(0) as usize;
        (addr % self.mb_width(), addr / self.mb_width())
    }

    fn skip_macroblock(&mut self) -> Result<()> {
        let (mb_x, mb_y) = self.mb_xy();
        if mb_y >= self.mb_height() {
            return decode_error("mpeg1: macroblock address past end of picture");
        }
        self.slice.dc_predictor_y = 128;
        self.slice.dc_predictor_cb = 128;
        self.slice.dc_predictor_cr = 128;

        // Skipped macroblocks in a P picture reset the forward predictors, so the prediction is
        // always the co-located macroblock of the reference frame.
        if self.picture_type() == PictureType::Predicted {
            self.slice.pmv_forward_x = 0;
            self.slice.pmv_forward_y = 0;
            self.motion_compensate(mb_x, mb_y, 0, 0);
        }
        Ok(())
    }

    fn decode_one_macroblock(&mut self) -> Result<()> {
        let (mb_x, mb_y) = self.mb_xy();
        if mb_y >= self.mb_height() {
            return decode_error("mpeg1: macroblock address past end of picture");
        }

        let table = match self.picture_type() {
            PictureType::Intra => &MACROBLOCK_TYPE_I,
            PictureType::Predicted => &MACROBLOCK_TYPE_P,
            _ => return decode_error("mpeg1: unsupported picture type reached macroblock decode"),
        };
        let Some(raw_type) = table.decode(self.bits_mut())
        else {
            return decode_error("mpeg1: truncated macroblock_type");
        };
        let mb_type = MacroblockType::from_bits_truncate(raw_type as u8);

        if mb_type.contains(MacroblockType::QUANT) {
            self.slice.quantizer_scale = self.bits_mut().read(5) as u8;
        }

        let is_intra = mb_type.contains(MacroblockType::INTRA);
        if !is_intra {
            self.slice.dc_predictor_y = 128;
            self.slice.dc_predictor_cb = 128;
            self.slice.dc_predictor_cr = 128;
        }

        if mb_type.contains(MacroblockType::MOTION_FORWARD) {
            let mut dx = self.decode_motion_component(true)?;
            let mut dy = self.decode_motion_component(false)?;
            // Full-pel pictures store predictors at full-pel precision; the reconstruction shift
            // turns them back into the half-pel units motion compensation works in.
            if self.full_pel_forward() {
                dx <<= 1;
                dy <<= 1;
            }
            self.motion_compensate(mb_x, mb_y, dx, dy);
        }
        else if !is_intra {
            // A non-intra macroblock without a coded vector predicts from the co-located
            // macroblock of the reference frame, and resets the vector predictors.
            self.slice.pmv_forward_x = 0;
            self.slice.pmv_forward_y = 0;
            if self.picture_type() == PictureType::Predicted {
                self.motion_compensate(mb_x, mb_y, 0, 0);
            }
        }

        let cbp = if mb_type.contains(MacroblockType::PATTERN) {
            let Some(pattern) = CODED_BLOCK_PATTERN.decode(self.bits_mut())
            else {
                return decode_error("mpeg1: truncated coded_block_pattern");
            };
            pattern as u32
        }
        else if is_intra {
            0x3F
        }
        else {
            0
        };

        for block_index in 0..6u32 {
            if cbp & (1 << (5 - block_index)) == 0 {
                continue;
            }
            self.decode_and_place_block(mb_x, mb_y, block_index as usize, is_intra)?;
        }

        Ok(())
    }

    fn motion_compensate(&mut self, mb_x: usize, mb_y: usize, dx_half: i32, dy_half: i32) {
        let (current, forward) = self.current_and_forward();
        current.copy_luma_macroblock(forward, mb_x, mb_y, dx_half, dy_half);
        // Chroma uses half the luma vector, floor-divided so negative odd vectors keep the same
        // integer/fractional split convention the copy itself uses.
        current.copy_chroma_macroblock(forward, mb_x, mb_y, dx_half.div_euclid(2), dy_half.div_euclid(2));
    }

    fn decode_motion_component(&mut self, horizontal: bool) -> Result<i32> {
        let Some(code) = MOTION_CODE.decode(self.bits_mut())
        else {
            return decode_error("mpeg1: truncated motion_code");
        };

        let f_code = self.forward_f_code().max(1);
        let r_size = (f_code - 1) as u32;

        let delta = if code == 0 {
            0
        }
        else if f_code == 1 {
            code
        }
        else {
            let r = self.bits_mut().read(r_size) as i32;
            let magnitude = (code.unsigned_abs() as i32 - 1) * (1 << r_size) + r + 1;
            if code < 0 {
                -magnitude
            }
            else {
                magnitude
            }
        };

        let predictor =
            if horizontal { &mut self.slice.pmv_forward_x } else { &mut self.slice.pmv_forward_y };
        *predictor += delta;
        // Motion vectors wrap within the range the f_code's precision allows, per the standard's
        // modulo reconstruction rule.
        let range = 16 * (1 << r_size);
        if *predictor < -range {
            *predictor += 2 * range;
        }
        else if *predictor >= range {
            *predictor -= 2 * range;
        }
        Ok(*predictor)
    }

    fn decode_and_place_block(&mut self, mb_x: usize, mb_y: usize, block_index: usize, is_intra: bool) -> Result<()> {
        let mut coeffs = [0i32; 64];

        if is_intra {
            self.decode_intra_dc(block_index, &mut coeffs)?;
            self.decode_ac_coefficients(&mut coeffs, 1, self.intra_quant_matrix_copy())?;
        }
        else {
            self.decode_ac_coefficients(&mut coeffs, 0, self.non_intra_quant_matrix_copy())?;
        }

        let spatial = idct_8x8(&coeffs);

        if is_intra {
            place_intra_block(self.current_mut(), mb_x, mb_y, block_index, &spatial);
        }
        else {
            place_inter_residual(self.current_mut(), mb_x, mb_y, block_index, &spatial);
        }

        Ok(())
    }

    fn intra_quant_matrix_copy(&self) -> [u8; 64] {
        *self.intra_quant_matrix()
    }

    fn non_intra_quant_matrix_copy(&self) -> [u8; 64] {
        *self.non_intra_quant_matrix()
    }

    fn decode_intra_dc(&mut self, block_index: usize, coeffs: &mut [i32; 64]) -> Result<()> {
        let is_luma = block_index < 4;
        let size_table = if is_luma { &DCT_DC_SIZE_LUMINANCE } else { &DCT_DC_SIZE_CHROMINANCE };
        let Some(size) = size_table.decode(self.bits_mut())
        else {
            return decode_error("mpeg1: truncated dct_dc_size");
        };

        let diff = if size == 0 { 0 } else { self.read_signed_magnitude(size as u32) };

        let predictor = match block_index {
            0 | 1 | 2 | 3 => &mut self.slice.dc_predictor_y,
            4 => &mut self.slice.dc_predictor_cb,
            _ => &mut self.slice.dc_predictor_cr,
        };
        *predictor += diff;
        coeffs[0] = *predictor * 8;
        Ok(())
    }

    /// Reads an `n`-bit differential value using the standard convention: the top bit
    /// distinguishes sign, and a leading 0 means the magnitude is one's-complemented.
    fn read_signed_magnitude(&mut self, n: u32) -> i32 {
        let raw = self.bits_mut().read(n) as i32;
        let half = 1 << (n - 1);
        if raw < half {
            raw - (1 << n) + 1
        }
        else {
            raw
        }
    }

    fn decode_ac_coefficients(&mut self, coeffs: &mut [i32; 64], start: usize, quant_matrix: [u8; 64]) -> Result<()> {
        let scale = i32::from(self.slice.quantizer_scale.max(1));
        let mut index = start;
        // Only the first coefficient of a non-intra block is exempt from the end-of-block
        // reading of the ambiguous code: an intra block's AC list may be empty.
        let mut first = start == 0;

        loop {
            let Some(symbol) = DCT_COEFF.decode(self.bits_mut())
            else {
                return decode_error("mpeg1: truncated dct_coeff");
            };

            // `DCT_COEFF_FIRST_OR_EOB` is the one ambiguous code in the table: as the first
            // coefficient it always means (run=0, level=1); afterwards it is followed by one
            // more bit that resolves it to end-of-block (0) or a real (run=0, level=1)
            // coefficient (1). Both real-coefficient cases still carry their own trailing sign
            // bit, read below along with every other non-escape code.
            if symbol == DCT_COEFF_FIRST_OR_EOB && !first && self.bits_mut().read(1) == 0 {
                return Ok(());
            }

            let (run, level) = if symbol == DCT_COEFF_ESCAPE {
                let run = self.bits_mut().read(6);
                let raw_level = self.bits_mut().read(8) as i32;
                let level = if raw_level == 0 {
                    self.bits_mut().read(8) as i32
                }
                else if raw_level == 128 {
                    (self.bits_mut().read(8) as i32) - 256
                }
                else if raw_level > 128 {
                    raw_level - 256
                }
                else {
                    raw_level
                };
                (run, level)
            }
            else if symbol == DCT_COEFF_FIRST_OR_EOB {
                (0u32, 1i32)
            }
            else {
                unpack(symbol)
            };

            let level = if symbol == DCT_COEFF_ESCAPE {
                level // sign already folded in by the escape path
            }
            else if self.bits_mut().read(1) != 0 {
                -level
            }
            else {
                level
            };

            index += run as usize;
            if index >= 64 {
                return decode_error("mpeg1: dct_coeff run past end of block");
            }

            let raster = ZIG_ZAG[index];
            let qm = i32::from(quant_matrix[raster]);
            let mut value = ((2 * level.abs() + 1) * scale * qm) >> 4;
            if value % 2 == 0 {
                value -= 1;
            }
            value = value.min(2047);
            if level < 0 {
                value = -value;
            }
            coeffs[raster] = value;

            index += 1;
            first = false;
        }
    }
}

fn place_intra_block(plane: &mut crate::planes::PlaneSet, mb_x: usize, mb_y: usize, block_index: usize, spatial: &[i32; 64]) {
    match block_index {
        0..=3 => plane.write_y_block(mb_x, mb_y, block_index, spatial),
        4 => plane.write_cb_block(mb_x, mb_y, spatial),
        _ => plane.write_cr_block(mb_x, mb_y, spatial),
    }
}

fn place_inter_residual(plane: &mut crate::planes::PlaneSet, mb_x: usize, mb_y: usize, block_index: usize, spatial: &[i32; 64]) {
    match block_index {
        0..=3 => {
            let col = block_index % 2;
            let row = block_index / 2;
            let x0 = mb_x * 16 + col * 8;
            let y0 = mb_y * 16 + row * 8;
            let stride = plane.width;
            add_residual_block(&mut plane.y, stride, x0, y0, spatial);
        }
        4 => {
            let stride = plane.chroma_width;
            add_residual_block(&mut plane.cb, stride, mb_x * 8, mb_y * 8, spatial);
        }
        _ => {
            let stride = plane.chroma_width;
            add_residual_block(&mut plane.cr, stride, mb_x * 8, mb_y * 8, spatial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_magnitude_matches_dct_diff_convention() {
        // size=3, raw=0b100 (4): top bit set means positive, value is raw as-is.
        assert_eq!(signed_magnitude_for_test(3, 0b100), 4);
        // raw below half (e.g. 0b011=3) maps to 3 - 8 + 1 = -4.
        assert_eq!(signed_magnitude_for_test(3, 0b011), -4);
    }

    fn signed_magnitude_for_test(n: u32, raw: i32) -> i32 {
        let half = 1 << (n - 1);
        if raw < half {
            raw - (1 << n) + 1
        }
        else {
            raw
        }
    }
}
