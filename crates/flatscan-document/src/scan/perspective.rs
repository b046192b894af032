// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective solving — the homography taking a document quadrilateral onto
// an upright rectangle, from four point correspondences.

use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::{corner_sine, Homography, OrderedQuad, Point2D};
use nalgebra::{Matrix3, SMatrix, SVector};
use tracing::{debug, instrument};

/// Source corners whose angle has a sine below this are treated as
/// collinear. About 0.06 degrees.
pub const COLLINEAR_SINE: f64 = 1e-3;

/// Smallest acceptable |det| of the normalised solution scaled to unit
/// Frobenius norm.
pub const DETERMINANT_EPSILON: f64 = 1e-8;

/// Homography plus the rectangle it maps onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveSolution {
    /// Maps source image coordinates onto the output rectangle.
    pub homography: Homography,
    pub width: u32,
    pub height: u32,
}

/// Solve for the transform that flattens `quad`.
///
/// The output rectangle is as wide as the longer of the top and bottom edges
/// and as tall as the longer of the left and right edges. Corners map to
/// `(0, 0)`, `(w, 0)`, `(w, h)` and `(0, h)` in TL, TR, BR, BL order.
#[instrument(skip_all)]
pub fn solve_perspective(quad: &OrderedQuad) -> Result<PerspectiveSolution> {
    let src = quad.corners();
    for i in 0..4 {
        let sine = corner_sine(&src[(i + 3) % 4], &src[i], &src[(i + 1) % 4]);
        if sine < COLLINEAR_SINE {
            return Err(FlatscanError::SingularTransform(format!(
                "corner {i} is nearly collinear with its neighbours (sine {sine:e})"
            )));
        }
    }

    let (width, height) = quad.target_size();
    let (w, h) = (width as f64, height as f64);
    let dst = [
        Point2D::new(0.0, 0.0),
        Point2D::new(w, 0.0),
        Point2D::new(w, h),
        Point2D::new(0.0, h),
    ];

    let homography = homography_from_correspondences(&src, &dst)?;
    debug!(width, height, "Perspective solved");
    Ok(PerspectiveSolution {
        homography,
        width,
        height,
    })
}

/// Exact homography mapping each `src[i]` onto `dst[i]`.
///
/// Both point sets are Hartley-normalised, the eight unknowns (with
/// `h22 = 1`) are solved by LU decomposition, and the result is mapped back to
/// pixel coordinates. Fails with `SingularTransform` when the system has no
/// unique solution.
pub fn homography_from_correspondences(
    src: &[Point2D; 4],
    dst: &[Point2D; 4],
) -> Result<Homography> {
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let [x, y] = src_n[i];
        let [u, v] = dst_n[i];
        let r = 2 * i;

        // u = (h00 x + h01 y + h02) / (h20 x + h21 y + 1)
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        // v = (h10 x + h11 y + h12) / (h20 x + h21 y + 1)
        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let sol = a.lu().solve(&b).ok_or_else(|| {
        FlatscanError::SingularTransform("correspondence system has no unique solution".into())
    })?;

    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        sol[0], sol[1], sol[2],
        sol[3], sol[4], sol[5],
        sol[6], sol[7], 1.0,
    );
    let det = (h_norm / h_norm.norm()).determinant();
    if !det.is_finite() || det.abs() < DETERMINANT_EPSILON {
        return Err(FlatscanError::SingularTransform(format!(
            "normalised homography determinant {det:e} is below {DETERMINANT_EPSILON:e}"
        )));
    }

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst.try_inverse().ok_or_else(|| {
        FlatscanError::SingularTransform("destination normalisation is not invertible".into())
    })?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    if !scale.is_finite() || scale.abs() < 1e-12 {
        return Err(FlatscanError::SingularTransform(
            "homography maps the origin to infinity".into(),
        ));
    }
    Homography::new(h / scale)
}

/// Translate the centroid to the origin and scale so the mean distance from
/// it is √2.
fn normalize_points(pts: &[Point2D; 4]) -> (Matrix3<f64>, [[f64; 2]; 4]) {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| (p.x - cx).hypot(p.y - cy))
        .sum::<f64>()
        / 4.0;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.map(|p| [s * (p.x - cx), s * (p.y - cy)]);
    (t, normalized)
}
