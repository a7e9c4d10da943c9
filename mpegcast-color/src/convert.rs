// mpegcast-color
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BGRX to 4:2:0 conversion.

use log::trace;
use mpegcast_core::Result;

use crate::image::{BgrxImage, PackedImage, PixelFormat, PlaneLayout, YuvImage};
use crate::scale::{argb_scale, scale_plane, FilterMode};

/// Full-range BT.601 luma, fixed-point with 8 fractional bits.
#[inline]
fn bt601_y(b: i32, g: i32, r: i32) -> u8 {
    ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
}

#[inline]
fn bt601_cb(b: i32, g: i32, r: i32) -> u8 {
    (((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

#[inline]
fn bt601_cr(b: i32, g: i32, r: i32) -> u8 {
    (((128 * r - 107 * g - 21 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

/// Converts packed BGRX frames to a 4:2:0 layout, optionally scaling.
///
/// For YUV420P output with scaling, the frame is converted at source resolution into a reusable
/// scratch buffer and each plane is scaled independently afterwards. For NV12 the packed input
/// is scaled first and converted second, writing planes straight into the output buffer. Either
/// way, every successful [`convert`](Self::convert) returns a freshly owned [`YuvImage`]; only
/// the scratch buffer is reused, which is safe because calls are serialized.
pub struct ColorConverter {
    format: PixelFormat,
    target: Option<(usize, usize)>,
    filter: FilterMode,
    unscaled: Option<YuvImage>,
}

impl ColorConverter {
    pub fn new(format: PixelFormat) -> Self {
        ColorConverter { format, target: None, filter: FilterMode::Bilinear, unscaled: None }
    }

    /// Requests scaling of every converted frame to `dst_width` x `dst_height`.
    pub fn with_scaling(mut self, dst_width: usize, dst_height: usize) -> Self {
        self.target = Some((dst_width, dst_height));
        self
    }

    /// Selects the scaling filter from a speed setting in `[0, 100]`: the fastest settings use
    /// no filter, the middle band bilinear, and the rest a box filter.
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.filter = FilterMode::from_speed(speed);
        self
    }

    /// Converts one frame. The returned image owns its backing buffer.
    pub fn convert(&mut self, image: &BgrxImage<'_>) -> Result<YuvImage> {
        let (dst_width, dst_height) =
            self.target.unwrap_or((image.width(), image.height()));
        let needs_scale = (dst_width, dst_height) != (image.width(), image.height());

        trace!(
            "convert {}x{} -> {:?} {}x{}",
            image.width(),
            image.height(),
            self.format,
            dst_width,
            dst_height
        );

        match self.format {
            PixelFormat::Yuv420p if needs_scale => {
                // Convert at source resolution, then scale plane by plane.
                let unscaled = self.unscaled_buffer(image.width(), image.height());
                convert_planes(image, unscaled);

                let mut out = YuvImage::new(PixelFormat::Yuv420p, dst_width, dst_height);
                scale_yuv420p(self.unscaled.as_ref().unwrap(), &mut out, self.filter);
                Ok(out)
            }
            PixelFormat::Yuv420p => {
                let mut out = YuvImage::new(PixelFormat::Yuv420p, dst_width, dst_height);
                convert_planes(image, &mut out);
                Ok(out)
            }
            PixelFormat::Nv12 if needs_scale => {
                // Scale the packed input first, then convert straight into the output planes.
                let scaled = argb_scale(image, dst_width, dst_height, self.filter);
                let mut out = YuvImage::new(PixelFormat::Nv12, dst_width, dst_height);
                convert_planes(&scaled.as_bgrx(), &mut out);
                Ok(out)
            }
            PixelFormat::Nv12 => {
                let mut out = YuvImage::new(PixelFormat::Nv12, dst_width, dst_height);
                convert_planes(image, &mut out);
                Ok(out)
            }
        }
    }

    fn unscaled_buffer(&mut self, width: usize, height: usize) -> &mut YuvImage {
        let stale = self
            .unscaled
            .as_ref()
            .map(|img| (img.width, img.height) != (width, height))
            .unwrap_or(true);
        if stale {
            self.unscaled = Some(YuvImage::new(PixelFormat::Yuv420p, width, height));
        }
        self.unscaled.as_mut().unwrap()
    }
}

/// Converts `src` into `dst`'s planes. `dst` must have `src`'s dimensions.
fn convert_planes(src: &BgrxImage<'_>, dst: &mut YuvImage) {
    debug_assert_eq!((src.width(), src.height()), (dst.width, dst.height));

    let format = dst.format;
    let layout = PlaneLayout::of(format, dst.width, dst.height);
    let (width, height) = (dst.width, dst.height);
    let chroma_width = (width + 1) / 2;
    let chroma_height = (height + 1) / 2;
    let planes = dst.planes_mut();

    for row in 0..height {
        let src_row = src.row(row);
        let dst_row = &mut planes.y[row * layout.y_stride..row * layout.y_stride + width];
        for (dst, &[b, g, r, _]) in dst_row.iter_mut().zip(src_row) {
            *dst = bt601_y(i32::from(b), i32::from(g), i32::from(r));
        }
    }

    // Chroma is computed from the 2x2-averaged source colors. Rows and columns past the edge of
    // an odd-sized image are clamped, which weights the edge samples double.
    for crow in 0..chroma_height {
        let top = src.row(crow * 2);
        let bottom = src.row(crow * 2 + 1);
        for ccol in 0..chroma_width {
            let c0 = (ccol * 2).min(width - 1);
            let c1 = (ccol * 2 + 1).min(width - 1);
            let mut b = 0i32;
            let mut g = 0i32;
            let mut r = 0i32;
            for &[pb, pg, pr, _] in [top[c0], top[c1], bottom[c0], bottom[c1]].iter() {
                b += i32::from(pb);
                g += i32::from(pg);
                r += i32::from(pr);
            }
            let (b, g, r) = ((b + 2) >> 2, (g + 2) >> 2, (r + 2) >> 2);

            match format {
                PixelFormat::Yuv420p => {
                    planes.cb[crow * layout.chroma_stride + ccol] = bt601_cb(b, g, r);
                    planes.cr[crow * layout.chroma_stride + ccol] = bt601_cr(b, g, r);
                }
                PixelFormat::Nv12 => {
                    let base = crow * layout.chroma_stride + ccol * 2;
                    planes.cb[base] = bt601_cb(b, g, r);
                    planes.cb[base + 1] = bt601_cr(b, g, r);
                }
            }
        }
    }
}

fn scale_yuv420p(src: &YuvImage, dst: &mut YuvImage, filter: FilterMode) {
    let src_layout = PlaneLayout::of(PixelFormat::Yuv420p, src.width, src.height);
    let dst_layout = PlaneLayout::of(PixelFormat::Yuv420p, dst.width, dst.height);

    let (sw, sh) = (src.width, src.height);
    let (scw, sch) = (src.chroma_width(), src.chroma_height());
    let (dw, dh) = (dst.width, dst.height);
    let (dcw, dch) = (dst.chroma_width(), dst.chroma_height());

    let src_y = src.y_plane();
    let src_cb = src.cb_plane();
    let src_cr = src.cr_plane();
    let planes = dst.planes_mut();

    scale_plane(src_y, src_layout.y_stride, sw, sh, planes.y, dst_layout.y_stride, dw, dh, filter);
    scale_plane(
        src_cb,
        src_layout.chroma_stride,
        scw,
        sch,
        planes.cb,
        dst_layout.chroma_stride,
        dcw,
        dch,
        filter,
    );
    scale_plane(
        src_cr,
        src_layout.chroma_stride,
        scw,
        sch,
        planes.cr,
        dst_layout.chroma_stride,
        dcw,
        dch,
        filter,
    );
}

/// Produces a packed 32-bit gray image with the same dimensions and stride layout as the input:
/// each pixel's B, G and R channels are replaced by its BT.601 luma, X is preserved.
pub fn argb_to_gray(image: &BgrxImage<'_>) -> PackedImage {
    let mut out = PackedImage::new(image.width(), image.height());
    for row in 0..image.height() {
        let src_row = image.row(row);
        for (dst, &[b, g, r, x]) in out.row_mut(row).iter_mut().zip(src_row) {
            let y = bt601_y(i32::from(b), i32::from(g), i32::from(r));
            *dst = [y, y, y, x];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: usize, height: usize, pixel: [u8; 4]) -> Vec<u8> {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&pixel);
        }
        data
    }

    #[test]
    fn blue_converts_to_bt601_reference_values() {
        let data = solid_image(640, 480, [255, 0, 0, 0]);
        let image = BgrxImage::new(&data, 640, 480, 640 * 4).unwrap();
        let mut converter = ColorConverter::new(PixelFormat::Yuv420p);
        let out = converter.convert(&image).unwrap();

        let layout = PlaneLayout::of(PixelFormat::Yuv420p, 640, 480);
        for row in 0..480 {
            for col in 0..640 {
                let y = out.y_plane()[row * layout.y_stride + col];
                assert!((i32::from(y) - 29).abs() <= 1, "y={y}");
            }
        }
        for crow in 0..240 {
            for ccol in 0..320 {
                let cb = out.cb_plane()[crow * layout.chroma_stride + ccol];
                let cr = out.cr_plane()[crow * layout.chroma_stride + ccol];
                assert!(i32::from(cb) >= 254, "cb={cb}");
                assert!((i32::from(cr) - 107).abs() <= 1, "cr={cr}");
            }
        }
    }

    #[test]
    fn nv12_interleaves_cb_cr() {
        let data = solid_image(32, 32, [255, 0, 0, 0]);
        let image = BgrxImage::new(&data, 32, 32, 32 * 4).unwrap();
        let mut converter = ColorConverter::new(PixelFormat::Nv12);
        let out = converter.convert(&image).unwrap();

        let uv = out.uv_plane();
        assert!(i32::from(uv[0]) >= 254);
        assert!((i32::from(uv[1]) - 107).abs() <= 1);
    }

    #[test]
    fn scaled_yuv420p_output_has_requested_dimensions() {
        let data = solid_image(64, 48, [0, 255, 0, 0]);
        let image = BgrxImage::new(&data, 64, 48, 64 * 4).unwrap();
        let mut converter =
            ColorConverter::new(PixelFormat::Yuv420p).with_scaling(32, 24).with_speed(50);
        let out = converter.convert(&image).unwrap();

        assert_eq!((out.width, out.height), (32, 24));
        // A solid green frame stays solid through scaling.
        let layout = PlaneLayout::of(PixelFormat::Yuv420p, 32, 24);
        let expected = out.y_plane()[0];
        for row in 0..24 {
            for col in 0..32 {
                assert_eq!(out.y_plane()[row * layout.y_stride + col], expected);
            }
        }
    }

    #[test]
    fn gray_conversion_preserves_dimensions_and_x() {
        let data = solid_image(5, 3, [10, 200, 30, 77]);
        let image = BgrxImage::new(&data, 5, 3, 5 * 4).unwrap();
        let gray = argb_to_gray(&image);

        assert_eq!((gray.width, gray.height), (5, 3));
        let [b, g, r, x] = gray.as_bgrx().row(0)[0];
        assert_eq!(b, g);
        assert_eq!(g, r);
        assert_eq!(x, 77);
    }
}
