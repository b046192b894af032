// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective warping — resample the source through a homography into the
// rectified output rectangle.

use flatscan_core::config::WarpConfig;
use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::{Bitmap, Homography};
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, Vector2};
use tracing::{debug, instrument};

use crate::image::convert::{bitmap_from_dynamic, bitmap_to_dynamic};

/// Resample `source` into a `width` x `height` bitmap.
///
/// `homography` maps source coordinates onto output coordinates; the centre
/// of every output pixel is pulled back through its inverse and sampled
/// bilinearly.
/// Samples falling outside the source take `config.background` (alpha, if
/// any, is opaque). The output keeps the source's channel count.
#[instrument(skip_all, fields(
    src_width = source.width(),
    src_height = source.height(),
    width = width,
    height = height,
))]
pub fn warp_perspective(
    source: &Bitmap,
    homography: &Homography,
    width: u32,
    height: u32,
    config: &WarpConfig,
) -> Result<Bitmap> {
    if width == 0 || height == 0 {
        return Err(FlatscanError::InvalidInput(format!(
            "warp target must be non-empty, got {width}x{height}"
        )));
    }

    let m = pixel_grid_transform(homography);
    #[rustfmt::skip]
    let coefficients = [
        m[(0, 0)], m[(0, 1)], m[(0, 2)],
        m[(1, 0)], m[(1, 1)], m[(1, 2)],
        m[(2, 0)], m[(2, 1)], m[(2, 2)],
    ]
    .map(|v| v as f32);
    let projection = Projection::from_matrix(coefficients).ok_or_else(|| {
        FlatscanError::SingularTransform("homography is not invertible in single precision".into())
    })?;

    let bg = config.background;
    let warped = match bitmap_to_dynamic(source)? {
        DynamicImage::ImageLuma8(img) => {
            DynamicImage::ImageLuma8(warp_buffer(&img, &projection, width, height, Luma([bg])))
        }
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(warp_buffer(
            &img,
            &projection,
            width,
            height,
            LumaA([bg, u8::MAX]),
        )),
        DynamicImage::ImageRgb8(img) => {
            DynamicImage::ImageRgb8(warp_buffer(&img, &projection, width, height, Rgb([bg; 3])))
        }
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(warp_buffer(
            &img,
            &projection,
            width,
            height,
            Rgba([bg, bg, bg, u8::MAX]),
        )),
        other => {
            return Err(FlatscanError::InvalidInput(format!(
                "unsupported pixel layout {:?}",
                other.color()
            )));
        }
    };

    debug!("Warp complete");
    bitmap_from_dynamic(&warped)
}

/// Re-express `homography` on the sampling grid.
///
/// Pipeline coordinates put pixel `(i, j)` over `[i, i + 1) x [j, j + 1)`,
/// so its centre sits at `(i + 0.5, j + 0.5)`. The resampler addresses
/// pixels by their integer index, hence the half-pixel shift on both sides.
fn pixel_grid_transform(homography: &Homography) -> Matrix3<f64> {
    let to_edges = Matrix3::new_translation(&Vector2::new(0.5, 0.5));
    let to_index = Matrix3::new_translation(&Vector2::new(-0.5, -0.5));
    to_index * homography.matrix() * to_edges
}

fn warp_buffer<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    projection: &Projection,
    width: u32,
    height: u32,
    background: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let mut out = ImageBuffer::from_pixel(width, height, background);
    warp_into(image, projection, Interpolation::Bilinear, background, &mut out);
    out
}
