// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner refinement — fit each side of the traced quadrilateral to the
// gradient of the preprocessed image, then intersect neighbouring sides.

use flatscan_core::config::RefineConfig;
use flatscan_core::error::Result;
use flatscan_core::{Bitmap, Point2D, Quadrilateral};
use imageproc::gradients::sobel_gradients;
use tracing::{debug, instrument, warn};

use crate::image::convert::bitmap_to_gray;

/// Fraction of each side skipped at both ends, where blur rounds the corner.
const END_TRIM: f64 = 0.15;

/// Spacing in pixels between profiles taken along a side.
const SAMPLE_SPACING: f64 = 2.0;

/// Sides shorter than this keep their traced position.
const MIN_SIDE: f64 = 8.0;

/// Fewest gradient peaks a side needs before its fitted line is used.
const MIN_PEAKS: usize = 4;

/// Gradient magnitude (Sobel units) a profile peak must exceed.
const PEAK_FLOOR: f32 = 8.0;

/// Peaks further than this from the first fit are dropped before refitting.
const OUTLIER_DISTANCE: f64 = 1.5;

/// Line `normal . p = offset` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Line {
    nx: f64,
    ny: f64,
    offset: f64,
}

impl Line {
    fn through(point: Point2D, nx: f64, ny: f64) -> Self {
        Self {
            nx,
            ny,
            offset: nx * point.x + ny * point.y,
        }
    }

    fn distance(&self, p: &Point2D) -> f64 {
        (self.nx * p.x + self.ny * p.y - self.offset).abs()
    }

    fn intersect(&self, other: &Line) -> Option<Point2D> {
        let det = self.nx * other.ny - self.ny * other.nx;
        if det.abs() < 1e-6 {
            return None;
        }
        Some(Point2D::new(
            (self.offset * other.ny - other.offset * self.ny) / det,
            (self.nx * other.offset - other.nx * self.offset) / det,
        ))
    }
}

/// Sobel magnitude of a single-channel image, sampled bilinearly.
struct GradientField {
    width: usize,
    height: usize,
    magnitude: Vec<f32>,
}

impl GradientField {
    fn new(gray: &Bitmap) -> Result<Self> {
        let image = bitmap_to_gray(gray)?;
        Ok(Self {
            width: image.width() as usize,
            height: image.height() as usize,
            magnitude: sobel_gradients(&image)
                .into_raw()
                .into_iter()
                .map(f32::from)
                .collect(),
        })
    }

    /// Magnitude at a fractional pixel index; `None` outside the image.
    fn sample(&self, x: f64, y: f64) -> Option<f32> {
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        if x0 + 1 >= self.width || y0 + 1 >= self.height {
            return None;
        }
        let (fx, fy) = ((x - x0 as f64) as f32, (y - y0 as f64) as f32);
        let at = |cx: usize, cy: usize| self.magnitude[cy * self.width + cx];
        let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
        let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }
}

/// Move the corners of a traced quadrilateral onto the document border.
///
/// `quad` holds contour vertices as pixel indices; the result is in
/// pipeline coordinates, where pixel `(i, j)` covers `[i, i + 1) x [j, j + 1)`.
/// Each side is fitted to the gradient peaks found within
/// `config.search_radius` of it, and each corner becomes the intersection of
/// its two fitted sides. A side with too few peaks keeps its traced line
/// pulled `inset` pixels towards the interior. When the refined corners do
/// not form a convex quadrilateral the traced corners are returned.
#[instrument(skip_all, fields(search_radius = config.search_radius, inset = inset))]
pub fn refine_quad(
    gray: &Bitmap,
    quad: &Quadrilateral,
    inset: f64,
    config: &RefineConfig,
) -> Result<Quadrilateral> {
    let traced = quad.points().map(to_pixel_edges);
    if !config.enabled {
        return Quadrilateral::new(traced);
    }

    let field = GradientField::new(gray)?;
    let points = quad.points();
    let centre = quad.centroid();

    let mut fitted = 0usize;
    let lines: [Line; 4] = std::array::from_fn(|i| {
        let (a, b) = (points[i], points[(i + 1) % 4]);
        let (nx, ny) = inward_normal(&a, &b, &centre);
        match fit_side(&field, &a, &b, (nx, ny), config.search_radius) {
            Some(line) => {
                fitted += 1;
                line
            }
            None => {
                let pulled = Point2D::new(a.x + nx * inset, a.y + ny * inset);
                Line::through(pulled, nx, ny)
            }
        }
    });

    let max_shift = 2.0 * config.search_radius + inset;
    let corners: [Point2D; 4] = std::array::from_fn(|i| {
        lines[(i + 3) % 4]
            .intersect(&lines[i])
            .filter(|p| p.distance(&points[i]) <= max_shift)
            .unwrap_or(points[i])
    });

    match Quadrilateral::new(corners.map(to_pixel_edges)) {
        Ok(refined) if refined.is_convex() => {
            debug!(fitted_sides = fitted, "Corners refined");
            Ok(refined)
        }
        _ => {
            warn!(
                fitted_sides = fitted,
                "Refined corners are degenerate; keeping traced corners"
            );
            Quadrilateral::new(traced)
        }
    }
}

/// Pixel index to pipeline coordinates (pixel centre).
fn to_pixel_edges(p: Point2D) -> Point2D {
    Point2D::new(p.x + 0.5, p.y + 0.5)
}

/// Unit normal of `a -> b` pointing towards `centre`.
fn inward_normal(a: &Point2D, b: &Point2D, centre: &Point2D) -> (f64, f64) {
    let len = a.distance(b).max(f64::EPSILON);
    let (nx, ny) = (-(b.y - a.y) / len, (b.x - a.x) / len);
    if nx * (centre.x - a.x) + ny * (centre.y - a.y) < 0.0 {
        (-nx, -ny)
    } else {
        (nx, ny)
    }
}

/// Total least-squares line through the gradient peaks across side `a -> b`.
fn fit_side(
    field: &GradientField,
    a: &Point2D,
    b: &Point2D,
    normal: (f64, f64),
    search_radius: f64,
) -> Option<Line> {
    let len = a.distance(b);
    if len < MIN_SIDE {
        return None;
    }

    let span = 1.0 - 2.0 * END_TRIM;
    let count = ((len * span / SAMPLE_SPACING) as usize).max(MIN_PEAKS);
    let reach = search_radius.ceil() as i32;

    let peaks: Vec<Point2D> = (0..count)
        .filter_map(|s| {
            let t = END_TRIM + span * (s as f64 + 0.5) / count as f64;
            let base = Point2D::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
            profile_peak(field, base, normal, reach)
        })
        .collect();
    if peaks.len() < MIN_PEAKS {
        return None;
    }

    let first = fit_line(&peaks)?;
    let inliers: Vec<Point2D> = peaks
        .into_iter()
        .filter(|p| first.distance(p) <= OUTLIER_DISTANCE)
        .collect();
    if inliers.len() < MIN_PEAKS {
        return None;
    }
    let line = fit_line(&inliers)?;

    // The fit must stay roughly parallel to, and near, the traced side.
    let midpoint = Point2D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let alignment = (line.nx * normal.0 + line.ny * normal.1).abs();
    if alignment < 0.95 || line.distance(&midpoint) > search_radius + 1.0 {
        return None;
    }
    Some(line)
}

/// Strongest gradient along `base + k * normal` for `k` in `-reach..=reach`,
/// located to sub-pixel precision with a parabola through its neighbours.
fn profile_peak(
    field: &GradientField,
    base: Point2D,
    normal: (f64, f64),
    reach: i32,
) -> Option<Point2D> {
    let profile: Vec<f32> = (-reach..=reach)
        .map(|k| {
            let k = k as f64;
            field.sample(base.x + normal.0 * k, base.y + normal.1 * k)
        })
        .collect::<Option<_>>()?;

    let (best, &peak) = profile
        .iter()
        .enumerate()
        .max_by(|x, y| x.1.total_cmp(y.1).then(y.0.cmp(&x.0)))?;
    if peak <= PEAK_FLOOR || best == 0 || best + 1 == profile.len() {
        return None;
    }

    let (before, after) = (profile[best - 1] as f64, profile[best + 1] as f64);
    let curvature = before - 2.0 * peak as f64 + after;
    let delta = if curvature.abs() > 1e-9 {
        (0.5 * (before - after) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    let k = (best as i32 - reach) as f64 + delta;
    Some(Point2D::new(base.x + normal.0 * k, base.y + normal.1 * k))
}

fn fit_line(points: &[Point2D]) -> Option<Line> {
    let n = points.len() as f64;
    if n < 2.0 {
        return None;
    }
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p.x - mx, p.y - my);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx + syy < 1e-12 {
        return None;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (nx, ny) = (-theta.sin(), theta.cos());
    Some(Line::through(Point2D::new(mx, my), nx, ny))
}
