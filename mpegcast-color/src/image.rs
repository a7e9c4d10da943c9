// mpegcast-color
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image views and owned plane buffers.

use mpegcast_core::{decode_error, Result};

/// Strides and plane offsets are padded up to this many bytes.
#[cfg(target_arch = "x86_64")]
pub const PLANE_ALIGNMENT: usize = 32;
#[cfg(not(target_arch = "x86_64"))]
pub const PLANE_ALIGNMENT: usize = 16;

pub(crate) fn align_up(n: usize) -> usize {
    (n + PLANE_ALIGNMENT - 1) & !(PLANE_ALIGNMENT - 1)
}

/// Bytes per packed BGRX pixel.
pub(crate) const BGRX_BPP: usize = 4;

/// A borrowed view of a packed 32-bit BGRX image. Byte order within a pixel is B, G, R, X.
#[derive(Copy, Clone)]
pub struct BgrxImage<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> BgrxImage<'a> {
    /// Wraps `data` as a `width` x `height` image whose rows are `stride` bytes apart.
    pub fn new(data: &'a [u8], width: usize, height: usize, stride: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return decode_error("bgrx image has zero dimensions");
        }
        if stride < width * BGRX_BPP {
            return decode_error("bgrx image stride shorter than a row");
        }
        if data.len() < stride * (height - 1) + width * BGRX_BPP {
            return decode_error("bgrx image data shorter than declared dimensions");
        }
        Ok(BgrxImage { data, width, height, stride })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// One row of pixels as `[b, g, r, x]` quads. `row` is clamped to the last row, so a caller
    /// walking rows in pairs does not step out of bounds on an odd-height image.
    pub(crate) fn row(&self, row: usize) -> &'a [[u8; 4]] {
        let row = row.min(self.height - 1);
        let start = row * self.stride;
        bytemuck::cast_slice(&self.data[start..start + self.width * BGRX_BPP])
    }
}

/// An owned packed 32-bit image, produced by the gray and scale operations. Same layout rules
/// as [`BgrxImage`]; the stride is aligned up to [`PLANE_ALIGNMENT`].
pub struct PackedImage {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl PackedImage {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let stride = align_up(width * BGRX_BPP);
        PackedImage { width, height, stride, data: vec![0u8; stride * height] }
    }

    /// A borrowed BGRX view of this image.
    pub fn as_bgrx(&self) -> BgrxImage<'_> {
        BgrxImage { data: &self.data, width: self.width, height: self.height, stride: self.stride }
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [[u8; 4]] {
        let start = row * self.stride;
        bytemuck::cast_slice_mut(&mut self.data[start..start + self.width * BGRX_BPP])
    }
}

/// The 4:2:0 output layouts the converter can produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Three planes: Y, then Cb, then Cr, each at its own aligned stride.
    Yuv420p,
    /// Two planes: Y, then interleaved Cb/Cr pairs.
    Nv12,
}

/// An owned 4:2:0 image. All planes live in one backing buffer; the buffer is freed when the
/// image is dropped. Plane offsets are multiples of [`PLANE_ALIGNMENT`] and every plane carries
/// two extra rows of padding past its nominal height.
pub struct YuvImage {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub y_stride: usize,
    /// Stride of the Cb/Cr planes (YUV420P) or of the interleaved UV plane (NV12).
    pub chroma_stride: usize,
    data: Vec<u8>,
}

impl YuvImage {
    pub(crate) fn new(format: PixelFormat, width: usize, height: usize) -> Self {
        let layout = PlaneLayout::of(format, width, height);
        YuvImage {
            format,
            width,
            height,
            y_stride: layout.y_stride,
            chroma_stride: layout.chroma_stride,
            data: vec![0u8; layout.total],
        }
    }

    pub fn chroma_width(&self) -> usize {
        (self.width + 1) / 2
    }

    pub fn chroma_height(&self) -> usize {
        (self.height + 1) / 2
    }

    pub fn y_plane(&self) -> &[u8] {
        let layout = PlaneLayout::of(self.format, self.width, self.height);
        &self.data[..layout.y_size]
    }

    /// The Cb plane. Panics if the format is not [`PixelFormat::Yuv420p`].
    pub fn cb_plane(&self) -> &[u8] {
        let layout = PlaneLayout::of(self.format, self.width, self.height);
        assert_eq!(self.format, PixelFormat::Yuv420p);
        &self.data[layout.y_size..layout.y_size + layout.chroma_size]
    }

    /// The Cr plane. Panics if the format is not [`PixelFormat::Yuv420p`].
    pub fn cr_plane(&self) -> &[u8] {
        let layout = PlaneLayout::of(self.format, self.width, self.height);
        assert_eq!(self.format, PixelFormat::Yuv420p);
        let start = layout.y_size + layout.chroma_size;
        &self.data[start..start + layout.chroma_size]
    }

    /// The interleaved UV plane. Panics if the format is not [`PixelFormat::Nv12`].
    pub fn uv_plane(&self) -> &[u8] {
        let layout = PlaneLayout::of(self.format, self.width, self.height);
        assert_eq!(self.format, PixelFormat::Nv12);
        &self.data[layout.y_size..layout.y_size + layout.chroma_size]
    }

    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn planes_mut(&mut self) -> PlanesMut<'_> {
        let layout = PlaneLayout::of(self.format, self.width, self.height);
        let (y, rest) = self.data.split_at_mut(layout.y_size);
        match self.format {
            PixelFormat::Yuv420p => {
                let (cb, rest) = rest.split_at_mut(layout.chroma_size);
                PlanesMut { y, cb, cr: &mut rest[..layout.chroma_size] }
            }
            PixelFormat::Nv12 => PlanesMut { y, cb: &mut rest[..layout.chroma_size], cr: &mut [] },
        }
    }
}

/// Mutable plane slices. For NV12, `cb` is the interleaved UV plane and `cr` is empty.
pub(crate) struct PlanesMut<'a> {
    pub y: &'a mut [u8],
    pub cb: &'a mut [u8],
    pub cr: &'a mut [u8],
}

pub(crate) struct PlaneLayout {
    pub y_stride: usize,
    pub chroma_stride: usize,
    pub y_size: usize,
    pub chroma_size: usize,
    pub total: usize,
}

impl PlaneLayout {
    pub fn of(format: PixelFormat, width: usize, height: usize) -> Self {
        let chroma_width = (width + 1) / 2;
        let chroma_height = (height + 1) / 2;

        let y_stride = align_up(width);
        let chroma_stride = match format {
            PixelFormat::Yuv420p => align_up(chroma_width),
            PixelFormat::Nv12 => align_up(chroma_width * 2),
        };

        // Two rows of slack per plane so chroma subsampling may read rows in pairs even when
        // the nominal height is odd.
        let y_size = y_stride * (height + 2);
        let chroma_size = chroma_stride * (chroma_height + 2);

        let total = match format {
            PixelFormat::Yuv420p => y_size + 2 * chroma_size,
            PixelFormat::Nv12 => y_size + chroma_size,
        };

        PlaneLayout { y_stride, chroma_stride, y_size, chroma_size, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_aligned_and_cover_the_row() {
        for (w, h) in [(1, 1), (17, 9), (640, 480), (1919, 1079)] {
            let layout = PlaneLayout::of(PixelFormat::Yuv420p, w, h);
            assert!(layout.y_stride >= w);
            assert_eq!(layout.y_stride % PLANE_ALIGNMENT, 0);
            assert!(layout.chroma_stride >= (w + 1) / 2);
            assert_eq!(layout.chroma_stride % PLANE_ALIGNMENT, 0);
            assert_eq!(layout.y_size % PLANE_ALIGNMENT, 0);
        }
    }

    #[test]
    fn total_size_is_the_sum_of_plane_sizes() {
        let image = YuvImage::new(PixelFormat::Yuv420p, 640, 480);
        let layout = PlaneLayout::of(PixelFormat::Yuv420p, 640, 480);
        assert_eq!(image.total_size(), layout.y_size + 2 * layout.chroma_size);

        let image = YuvImage::new(PixelFormat::Nv12, 640, 480);
        let layout = PlaneLayout::of(PixelFormat::Nv12, 640, 480);
        assert_eq!(image.total_size(), layout.y_size + layout.chroma_size);
    }

    #[test]
    fn nv12_uv_plane_holds_interleaved_pairs() {
        let image = YuvImage::new(PixelFormat::Nv12, 639, 479);
        assert_eq!(image.chroma_width(), 320);
        assert_eq!(image.chroma_height(), 240);
        assert!(image.chroma_stride >= 2 * image.chroma_width());
    }

    #[test]
    fn bgrx_image_rejects_short_buffers() {
        let data = vec![0u8; 15];
        // One byte short of the last row, and a stride shorter than a row.
        assert!(BgrxImage::new(&data, 2, 2, 8).is_err());
        assert!(BgrxImage::new(&data, 2, 2, 7).is_err());
        let data = vec![0u8; 16];
        assert!(BgrxImage::new(&data, 2, 2, 8).is_ok());
    }
}
