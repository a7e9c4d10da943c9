// mpegcast-color
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plane and packed-image scaling.

use crate::image::{BgrxImage, PackedImage};

/// The resampling filter used when scaling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterMode {
    /// Nearest-neighbor. Pixel-identical to the input when dimensions are unchanged.
    None,
    /// Two-tap linear interpolation in each axis.
    Bilinear,
    /// Average over the whole source footprint of each destination pixel. Best for large
    /// downscales, where bilinear would skip source rows entirely.
    Box,
}

impl FilterMode {
    /// Maps a speed setting in `[0, 100]` to a filter: the top third trades quality for speed,
    /// the middle third interpolates, the bottom third averages.
    pub fn from_speed(speed: u32) -> Self {
        if speed > 66 {
            FilterMode::None
        }
        else if speed > 33 {
            FilterMode::Bilinear
        }
        else {
            FilterMode::Box
        }
    }
}

/// 16.16 fixed point, used for the source-coordinate stepping in nearest and bilinear modes.
const FP_SHIFT: u32 = 16;
const FP_ONE: i64 = 1 << FP_SHIFT;

/// Scales one 8-bit plane. Strides are in bytes; the destination region is fully written.
#[allow(clippy::too_many_arguments)]
pub(crate) fn scale_plane(
    src: &[u8],
    src_stride: usize,
    src_w: usize,
    src_h: usize,
    dst: &mut [u8],
    dst_stride: usize,
    dst_w: usize,
    dst_h: usize,
    filter: FilterMode,
) {
    match filter {
        FilterMode::None => {
            for dy in 0..dst_h {
                let sy = dy * src_h / dst_h;
                let src_row = &src[sy * src_stride..];
                let dst_row = &mut dst[dy * dst_stride..];
                for dx in 0..dst_w {
                    dst_row[dx] = src_row[dx * src_w / dst_w];
                }
            }
        }
        FilterMode::Bilinear => {
            for dy in 0..dst_h {
                let (sy0, sy1, fy) = bilinear_axis(dy, dst_h, src_h);
                for dx in 0..dst_w {
                    let (sx0, sx1, fx) = bilinear_axis(dx, dst_w, src_w);
                    let p00 = i64::from(src[sy0 * src_stride + sx0]);
                    let p01 = i64::from(src[sy0 * src_stride + sx1]);
                    let p10 = i64::from(src[sy1 * src_stride + sx0]);
                    let p11 = i64::from(src[sy1 * src_stride + sx1]);
                    let top = p00 * (FP_ONE - fx) + p01 * fx;
                    let bottom = p10 * (FP_ONE - fx) + p11 * fx;
                    let value = (top * (FP_ONE - fy) + bottom * fy + (1 << (2 * FP_SHIFT - 1)))
                        >> (2 * FP_SHIFT);
                    dst[dy * dst_stride + dx] = value as u8;
                }
            }
        }
        FilterMode::Box => {
            for dy in 0..dst_h {
                let y0 = dy * src_h / dst_h;
                let y1 = (((dy + 1) * src_h + dst_h - 1) / dst_h).max(y0 + 1).min(src_h);
                for dx in 0..dst_w {
                    let x0 = dx * src_w / dst_w;
                    let x1 = (((dx + 1) * src_w + dst_w - 1) / dst_w).max(x0 + 1).min(src_w);
                    let mut sum = 0u32;
                    for sy in y0..y1 {
                        for sx in x0..x1 {
                            sum += u32::from(src[sy * src_stride + sx]);
                        }
                    }
                    let count = ((y1 - y0) * (x1 - x0)) as u32;
                    dst[dy * dst_stride + dx] = ((sum + count / 2) / count) as u8;
                }
            }
        }
    }
}

/// Source sample pair and interpolation weight for destination coordinate `d`, with the sample
/// grid centered on pixel centers and edge samples clamped.
fn bilinear_axis(d: usize, dst_len: usize, src_len: usize) -> (usize, usize, i64) {
    let pos = ((2 * d as i64 + 1) * src_len as i64 * FP_ONE / (2 * dst_len as i64)) - FP_ONE / 2;
    let pos = pos.max(0);
    let i0 = (pos >> FP_SHIFT) as usize;
    let i0 = i0.min(src_len - 1);
    let i1 = (i0 + 1).min(src_len - 1);
    let frac = if i1 == i0 { 0 } else { pos & (FP_ONE - 1) };
    (i0, i1, frac)
}

/// Produces a scaled copy of a packed 32-bit image. Channels are resampled independently;
/// with [`FilterMode::None`] and unchanged dimensions the copy is pixel-identical.
pub fn argb_scale(image: &BgrxImage<'_>, dst_w: usize, dst_h: usize, filter: FilterMode) -> PackedImage {
    let mut out = PackedImage::new(dst_w, dst_h);
    let (src_w, src_h) = (image.width(), image.height());

    match filter {
        FilterMode::None => {
            for dy in 0..dst_h {
                let src_row = image.row(dy * src_h / dst_h);
                let dst_row = out.row_mut(dy);
                for (dx, dst) in dst_row.iter_mut().enumerate() {
                    *dst = src_row[dx * src_w / dst_w];
                }
            }
        }
        // Box reduces to bilinear for packed input: the packed path only pre-scales NV12 frames,
        // where the 2x2 chroma averaging that follows already low-passes the result.
        FilterMode::Bilinear | FilterMode::Box => {
            for dy in 0..dst_h {
                let (sy0, sy1, fy) = bilinear_axis(dy, dst_h, src_h);
                let top = image.row(sy0);
                let bottom = image.row(sy1);
                let dst_row = out.row_mut(dy);
                for (dx, dst) in dst_row.iter_mut().enumerate() {
                    let (sx0, sx1, fx) = bilinear_axis(dx, dst_w, src_w);
                    for ch in 0..4 {
                        let p00 = i64::from(top[sx0][ch]);
                        let p01 = i64::from(top[sx1][ch]);
                        let p10 = i64::from(bottom[sx0][ch]);
                        let p11 = i64::from(bottom[sx1][ch]);
                        let t = p00 * (FP_ONE - fx) + p01 * fx;
                        let b = p10 * (FP_ONE - fx) + p11 * fx;
                        let value = (t * (FP_ONE - fy) + b * fy + (1 << (2 * FP_SHIFT - 1)))
                            >> (2 * FP_SHIFT);
                        dst[ch] = value as u8;
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BgrxImage;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn speed_selects_filter_bands() {
        assert_eq!(FilterMode::from_speed(100), FilterMode::None);
        assert_eq!(FilterMode::from_speed(67), FilterMode::None);
        assert_eq!(FilterMode::from_speed(66), FilterMode::Bilinear);
        assert_eq!(FilterMode::from_speed(34), FilterMode::Bilinear);
        assert_eq!(FilterMode::from_speed(33), FilterMode::Box);
        assert_eq!(FilterMode::from_speed(0), FilterMode::Box);
    }

    #[test]
    fn nearest_same_size_is_identity() {
        let mut rng = SmallRng::seed_from_u64(0x5CA1E);
        let data: Vec<u8> = (0..16 * 8 * 4).map(|_| rng.gen()).collect();
        let image = BgrxImage::new(&data, 16, 8, 16 * 4).unwrap();

        let copy = argb_scale(&image, 16, 8, FilterMode::None);
        for row in 0..8 {
            assert_eq!(copy.as_bgrx().row(row), image.row(row));
        }
    }

    #[test]
    fn plane_scaling_with_no_filter_same_size_is_identity() {
        let mut rng = SmallRng::seed_from_u64(7);
        let src: Vec<u8> = (0..32 * 8).map(|_| rng.gen()).collect();
        let mut dst = vec![0u8; 32 * 8];
        scale_plane(&src, 32, 32, 8, &mut dst, 32, 32, 8, FilterMode::None);
        assert_eq!(src, dst);
    }

    #[test]
    fn bilinear_same_size_is_identity() {
        let mut rng = SmallRng::seed_from_u64(11);
        let src: Vec<u8> = (0..32 * 8).map(|_| rng.gen()).collect();
        let mut dst = vec![0u8; 32 * 8];
        scale_plane(&src, 32, 32, 8, &mut dst, 32, 32, 8, FilterMode::Bilinear);
        assert_eq!(src, dst);
    }

    #[test]
    fn box_downscale_averages() {
        // 4x2 plane downscaled to 2x1: each output pixel averages a 2x2 box.
        let src = [10u8, 30, 100, 200, 20, 40, 100, 200];
        let mut dst = [0u8; 2];
        scale_plane(&src, 4, 4, 2, &mut dst, 2, 2, 1, FilterMode::Box);
        assert_eq!(dst, [25, 150]);
    }

    #[test]
    fn upscale_covers_every_destination_pixel() {
        let src = [128u8; 4];
        let mut dst = [0u8; 64];
        scale_plane(&src, 2, 2, 2, &mut dst, 8, 8, 8, FilterMode::Bilinear);
        assert!(dst.iter().all(|&v| v == 128));
    }
}
