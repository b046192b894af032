// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview overlay: outline the detected document on the original photo.

use flatscan_core::error::Result;
use flatscan_core::{Bitmap, OrderedQuad};
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_line_segment_mut;
use tracing::{debug, instrument};

use super::convert::{bitmap_from_dynamic, bitmap_to_dynamic};

/// Draw the outline of `quad` over a copy of `bitmap`.
///
/// The result is always RGBA so the outline colour survives on gray input.
/// `thickness` is in pixels; lines are drawn as parallel one-pixel segments.
#[instrument(skip(bitmap, quad), fields(width = bitmap.width(), height = bitmap.height()))]
pub fn highlight_document(
    bitmap: &Bitmap,
    quad: &OrderedQuad,
    color: [u8; 3],
    thickness: u32,
) -> Result<Bitmap> {
    let mut canvas = bitmap_to_dynamic(bitmap)?.to_rgba8();
    let ink = Rgba([color[0], color[1], color[2], 255]);
    let corners = quad.corners();
    let thickness = thickness.max(1) as i64;
    let half = thickness / 2;

    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        // Offset perpendicular-ish: shift along whichever axis the segment
        // crosses more steeply.
        let mostly_horizontal = (b.x - a.x).abs() >= (b.y - a.y).abs();
        for k in 0..thickness {
            let offset = (k - half) as f32;
            let (dx, dy) = if mostly_horizontal {
                (0.0, offset)
            } else {
                (offset, 0.0)
            };
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32 + dx, a.y as f32 + dy),
                (b.x as f32 + dx, b.y as f32 + dy),
                ink,
            );
        }
    }

    debug!(thickness, "Document outline drawn");
    bitmap_from_dynamic(&DynamicImage::ImageRgba8(canvas))
}
