// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner ordering — assign top-left, top-right, bottom-right and bottom-left
// roles to the four corners of a detected quadrilateral.

use std::cmp::Ordering;

use flatscan_core::error::Result;
use flatscan_core::{OrderedQuad, Point2D, Quadrilateral};
use tracing::trace;

/// Offsets from the centroid smaller than this count as lying on an axis.
pub const AXIS_TOLERANCE: f64 = 1e-6;

/// Two `x + y` sums closer than this count as equal when choosing the
/// top-left corner in the angular fallback.
pub const SUM_TIE_TOLERANCE: f64 = 1e-6;

/// Assign canonical roles to the corners of `quad`.
///
/// Each corner is first classified by the quadrant it occupies relative to
/// the centroid. When a corner sits on an axis, or two corners share a
/// quadrant (strong rotation or skew), the corners are instead sorted
/// clockwise by angle and the one with the smallest `x + y` becomes the
/// top-left. The result depends only on the corner positions, never on
/// their input order.
///
/// Fails only if the chosen order folds the corners into a degenerate quad,
/// which a convex input never does.
pub fn order_corners(quad: &Quadrilateral) -> Result<OrderedQuad> {
    let points = quad.points();
    let center = quad.centroid();

    let [tl, tr, br, bl] = match by_quadrant(points, &center) {
        Some(roles) => roles,
        None => {
            trace!("Quadrant classification ambiguous; ordering by angle");
            by_angle(points, &center)
        }
    };
    OrderedQuad::from_corners(tl, tr, br, bl)
}

fn by_quadrant(points: &[Point2D; 4], center: &Point2D) -> Option<[Point2D; 4]> {
    let mut roles: [Option<Point2D>; 4] = [None; 4];
    for p in points {
        let dx = p.x - center.x;
        let dy = p.y - center.y;
        if dx.abs() < AXIS_TOLERANCE || dy.abs() < AXIS_TOLERANCE {
            return None;
        }
        let slot = match (dx < 0.0, dy < 0.0) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        };
        if roles[slot].replace(*p).is_some() {
            return None;
        }
    }
    Some([roles[0]?, roles[1]?, roles[2]?, roles[3]?])
}

fn by_angle(points: &[Point2D; 4], center: &Point2D) -> [Point2D; 4] {
    let mut sorted = *points;
    // y grows downwards, so increasing angle runs clockwise on screen.
    sorted.sort_by(|a, b| {
        let ta = (a.y - center.y).atan2(a.x - center.x);
        let tb = (b.y - center.y).atan2(b.x - center.x);
        ta.total_cmp(&tb)
    });

    let start = (0..4)
        .min_by(|&i, &j| {
            let (a, b) = (&sorted[i], &sorted[j]);
            let sum = (a.x + a.y) - (b.x + b.y);
            if sum.abs() < SUM_TIE_TOLERANCE {
                (a.y - a.x).total_cmp(&(b.y - b.x))
            } else if sum < 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        })
        .unwrap_or(0);

    std::array::from_fn(|k| sorted[(start + k) % 4])
}
