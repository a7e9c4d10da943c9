// mpegcast-color
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Color-space conversion and scaling for the `mpegcast` streaming core.
//!
//! Converts packed 32-bit BGRX frames into planar YUV420P or semi-planar NV12, optionally
//! scaling on the way. Plane strides are padded up to [`PLANE_ALIGNMENT`] and every plane
//! carries two extra rows of padding, so row-pair reads near the bottom edge of an odd-height
//! image stay inside the allocation.

mod convert;
mod image;
mod scale;

pub use convert::{argb_to_gray, ColorConverter};
pub use image::{BgrxImage, PackedImage, PixelFormat, YuvImage, PLANE_ALIGNMENT};
pub use scale::{argb_scale, FilterMode};
