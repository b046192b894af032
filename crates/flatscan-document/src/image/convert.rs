// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversions between `Bitmap` and the `image` crate's buffer types.

use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::Bitmap;
use image::{DynamicImage, GrayImage, GrayAlphaImage, ImageBuffer, RgbImage, RgbaImage};

/// Copy a `DynamicImage` into a `Bitmap`.
///
/// 8-bit layouts are kept as-is. Deeper or floating-point images are reduced
/// to 8 bits, keeping alpha when present.
pub fn bitmap_from_dynamic(image: &DynamicImage) -> Result<Bitmap> {
    let (width, height) = (image.width(), image.height());
    let (channels, data) = match image {
        DynamicImage::ImageLuma8(buf) => (1, buf.as_raw().clone()),
        DynamicImage::ImageLumaA8(buf) => (2, buf.as_raw().clone()),
        DynamicImage::ImageRgb8(buf) => (3, buf.as_raw().clone()),
        DynamicImage::ImageRgba8(buf) => (4, buf.as_raw().clone()),
        other => {
            let color = other.color();
            match (color.has_color(), color.has_alpha()) {
                (false, false) => (1, other.to_luma8().into_raw()),
                (false, true) => (2, other.to_luma_alpha8().into_raw()),
                (true, false) => (3, other.to_rgb8().into_raw()),
                (true, true) => (4, other.to_rgba8().into_raw()),
            }
        }
    };
    Bitmap::new(width, height, channels, data)
}

/// Copy a `Bitmap` into the matching `DynamicImage` variant.
pub fn bitmap_to_dynamic(bitmap: &Bitmap) -> Result<DynamicImage> {
    let (w, h) = (bitmap.width(), bitmap.height());
    let data = bitmap.data().to_vec();
    let image = match bitmap.channels() {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        _ => None,
    };
    image.ok_or_else(|| {
        FlatscanError::InvalidInput(format!(
            "cannot view {}x{}x{} bitmap as an image buffer",
            w,
            h,
            bitmap.channels()
        ))
    })
}

/// View a single-channel `Bitmap` as a `GrayImage`.
pub fn bitmap_to_gray(bitmap: &Bitmap) -> Result<GrayImage> {
    if bitmap.channels() != 1 {
        return Err(FlatscanError::InvalidInput(format!(
            "expected a single-channel bitmap, got {} channels",
            bitmap.channels()
        )));
    }
    ImageBuffer::from_raw(bitmap.width(), bitmap.height(), bitmap.data().to_vec()).ok_or_else(
        || FlatscanError::InvalidInput("gray bitmap buffer has the wrong length".into()),
    )
}

/// Wrap a `GrayImage` as a single-channel `Bitmap`.
pub fn gray_to_bitmap(image: GrayImage) -> Result<Bitmap> {
    let (w, h) = image.dimensions();
    Bitmap::new(w, h, 1, image.into_raw())
}
