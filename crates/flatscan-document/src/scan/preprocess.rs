// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing — luminance conversion, noise suppression and contrast
// normalisation ahead of edge detection.

use flatscan_core::config::PreprocessConfig;
use flatscan_core::error::Result;
use flatscan_core::Bitmap;
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

use crate::image::convert::{bitmap_to_dynamic, gray_to_bitmap};

/// Intensity standard deviation at or below which an image is treated as
/// blank. Equalizing such an image would only amplify rounding noise.
const FLAT_STDDEV: f64 = 1.0;

/// Reduce `bitmap` to a smoothed single-channel image of the same size.
///
/// 1. Luminance from a weighted channel sum (alpha is ignored)
/// 2. Gaussian blur with `blur_sigma`
/// 3. Histogram equalisation when the intensity spread is low, so pages shot
///    in dim light still produce usable gradients
///
/// Deterministic and infallible for any valid bitmap; a zero-sized bitmap
/// cannot be constructed, so `InvalidInput` is reported at the boundary.
#[instrument(skip_all, fields(
    width = bitmap.width(),
    height = bitmap.height(),
    channels = bitmap.channels(),
))]
pub fn preprocess(bitmap: &Bitmap, config: &PreprocessConfig) -> Result<Bitmap> {
    let gray = bitmap_to_dynamic(bitmap)?.to_luma8();

    let smoothed = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, config.blur_sigma)
    } else {
        gray
    };

    let stddev = intensity_stddev(&smoothed);
    let normalized = if stddev > FLAT_STDDEV && stddev < config.equalize_below_stddev {
        debug!(
            stddev,
            threshold = config.equalize_below_stddev,
            "Low contrast; equalizing histogram"
        );
        equalize_histogram(&smoothed)
    } else {
        smoothed
    };

    debug!(stddev, "Preprocessing complete");
    gray_to_bitmap(normalized)
}

/// Population standard deviation of the pixel intensities.
fn intensity_stddev(gray: &GrayImage) -> f64 {
    let count = gray.width() as f64 * gray.height() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let (sum, sum_sq) = gray.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = p.0[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0).sqrt()
}
