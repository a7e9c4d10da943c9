// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar YCbCr frame storage and the motion-compensated copy/blend primitives macroblocks use.

/// One decoded frame's planes, 4:2:0 subsampled: `cb`/`cr` are half resolution in both
/// dimensions, rounded up to the nearest macroblock (16px) boundary as MPEG-1 requires.
#[derive(Clone)]
pub struct PlaneSet {
    pub width: usize,
    pub height: usize,
    pub chroma_width: usize,
    pub chroma_height: usize,
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

impl PlaneSet {
    pub fn new(coded_width: usize, coded_height: usize) -> Self {
        let chroma_width = coded_width / 2;
        let chroma_height = coded_height / 2;
        PlaneSet {
            width: coded_width,
            height: coded_height,
            chroma_width,
            chroma_height,
            y: vec![0u8; coded_width * coded_height],
            cb: vec![0u8; chroma_width * chroma_height],
            cr: vec![0u8; chroma_width * chroma_height],
        }
    }

    /// Writes an 8x8 block of already-reconstructed samples (full range, no further processing)
    /// into the luma plane at a macroblock-relative block position.
    pub fn write_y_block(&mut self, mb_x: usize, mb_y: usize, block_index: usize, block: &[i32; 64]) {
        let (bx, by) = luma_block_origin(mb_x, mb_y, block_index);
        write_block(&mut self.y, self.width, bx, by, block);
    }

    pub fn write_cb_block(&mut self, mb_x: usize, mb_y: usize, block: &[i32; 64]) {
        write_block(&mut self.cb, self.chroma_width, mb_x * 8, mb_y * 8, block);
    }

    pub fn write_cr_block(&mut self, mb_x: usize, mb_y: usize, block: &[i32; 64]) {
        write_block(&mut self.cr, self.chroma_width, mb_x * 8, mb_y * 8, block);
    }

    /// Copies a 16x16 motion-compensated luma macroblock from `src` at a (possibly half-pel)
    /// offset into this plane's macroblock at `(mb_x, mb_y)`.
    pub fn copy_luma_macroblock(&mut self, src: &PlaneSet, mb_x: usize, mb_y: usize, dx_half: i32, dy_half: i32) {
        copy_mc_block(&mut self.y, &src.y, self.width, self.height, mb_x * 16, mb_y * 16, 16, 16, dx_half, dy_half);
    }

    pub fn copy_chroma_macroblock(&mut self, src: &PlaneSet, mb_x: usize, mb_y: usize, dx_half: i32, dy_half: i32) {
        copy_mc_block(&mut self.cb, &src.cb, self.chroma_width, self.chroma_height, mb_x * 8, mb_y * 8, 8, 8, dx_half, dy_half);
        copy_mc_block(&mut self.cr, &src.cr, self.chroma_width, self.chroma_height, mb_x * 8, mb_y * 8, 8, 8, dx_half, dy_half);
    }
}

fn luma_block_origin(mb_x: usize, mb_y: usize, block_index: usize) -> (usize, usize) {
    let (col, row) = match block_index {
        0 => (0, 0),
        1 => (1, 0),
        2 => (0, 1),
        3 => (1, 1),
        _ => unreachable!("luma block index out of range"),
    };
    (mb_x * 16 + col * 8, mb_y * 16 + row * 8)
}

fn write_block(plane: &mut [u8], stride: usize, x0: usize, y0: usize, block: &[i32; 64]) {
    for row in 0..8 {
        let dst_row = (y0 + row) * stride + x0;
        for col in 0..8 {
            plane[dst_row + col] = block[row * 8 + col].clamp(0, 255) as u8;
        }
    }
}

/// Copies a `w x h` block using quarter-resolution motion vectors expressed in half-pel units
/// (`dx_half`/`dy_half`), averaging the 1, 2, or 4 neighboring integer-pel samples bilinearly per
/// ISO/IEC 11172-2 motion compensation.
#[allow(clippy::too_many_arguments)]
fn copy_mc_block(
    dst: &mut [u8],
    src: &[u8],
    stride: usize,
    height: usize,
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    dx_half: i32,
    dy_half: i32,
) {
    let full_x = dx_half.div_euclid(2);
    let full_y = dy_half.div_euclid(2);
    let half_x = dx_half.rem_euclid(2) != 0;
    let half_y = dy_half.rem_euclid(2) != 0;

    let sample = |row: i32, col: i32| -> i32 {
        let row = row.clamp(0, height as i32 - 1) as usize;
        let col = col.clamp(0, stride as i32 - 1) as usize;
        i32::from(src[row * stride + col])
    };

    for r in 0..h {
        for c in 0..w {
            let sr = y0 as i32 + r as i32 + full_y;
            let sc = x0 as i32 + c as i32 + full_x;
            let value = match (half_x, half_y) {
                (false, false) => sample(sr, sc),
                (true, false) => (sample(sr, sc) + sample(sr, sc + 1) + 1) / 2,
                (false, true) => (sample(sr, sc) + sample(sr + 1, sc) + 1) / 2,
                (true, true) => {
                    (sample(sr, sc) + sample(sr, sc + 1) + sample(sr + 1, sc) + sample(sr + 1, sc + 1) + 2) / 4
                }
            };
            dst[(y0 + r) * stride + (x0 + c)] = value.clamp(0, 255) as u8;
        }
    }
}

/// Adds a residual 8x8 block (from the IDCT) onto an already motion-compensated prediction
/// already sitting in the destination plane, in place.
pub fn add_residual_block(plane: &mut [u8], stride: usize, x0: usize, y0: usize, residual: &[i32; 64]) {
    for row in 0..8 {
        let dst_row = (y0 + row) * stride + x0;
        for col in 0..8 {
            let predicted = i32::from(plane[dst_row + col]);
            plane[dst_row + col] = (predicted + residual[row * 8 + col]).clamp(0, 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_y_block_places_each_of_four_blocks_correctly() {
        let mut planes = PlaneSet::new(32, 32);
        let block = [7i32; 64];
        planes.write_y_block(0, 0, 3, &block);
        assert_eq!(planes.y[(8) * 32 + 8], 7);
        assert_eq!(planes.y[(0) * 32 + 0], 0);
    }

    #[test]
    fn full_pel_copy_is_exact() {
        let mut src = PlaneSet::new(16, 16);
        for (i, v) in src.y.iter_mut().enumerate() {
            *v = (i % 256) as u8;
        }
        let mut dst = PlaneSet::new(16, 16);
        dst.copy_luma_macroblock(&src, 0, 0, 0, 0);
        assert_eq!(dst.y, src.y);
    }

    #[test]
    fn half_pel_averages_neighbors() {
        let mut src = PlaneSet::new(16, 16);
        src.y[0] = 10;
        src.y[1] = 20;
        let mut dst = PlaneSet::new(16, 16);
        dst.copy_luma_macroblock(&src, 0, 0, 1, 0);
        assert_eq!(dst.y[0], 15);
    }
}
