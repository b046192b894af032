// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral candidate selection — reduce each contour to a polygon, keep
// the convex four-sided ones and pick the most document-like.

use std::f64::consts::SQRT_2;

use flatscan_core::config::SelectionPolicy;
use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::{Contour, Point2D, Quadrilateral};
use tracing::{debug, instrument, trace};

/// A contour that survived approximation and filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadCandidate {
    pub quad: Quadrilateral,
    pub area: f64,
    pub aspect_ratio: f64,
    pub score: f64,
    /// Position of the source contour in extraction order.
    pub index: usize,
}

impl QuadCandidate {
    /// Distance of the aspect ratio from a sheet of paper (√2), on a log scale.
    fn paper_distance(&self) -> f64 {
        (self.aspect_ratio / SQRT_2).ln().abs()
    }
}

/// How close `aspect_ratio` is to √2, in `(0, 1]`.
pub fn paper_closeness(aspect_ratio: f64) -> f64 {
    let r = aspect_ratio / SQRT_2;
    r.min(1.0 / r)
}

/// Simplify a closed contour to a polygon whose edges stay within `epsilon`
/// of the traced boundary.
///
/// Douglas-Peucker over the two chains between the first point and the point
/// farthest from it, then a cleanup pass that drops vertices lying within
/// `epsilon` of the line through their neighbours. That second pass removes
/// the split point when it sits in the middle of a straight edge.
pub fn approximate_polygon(contour: &Contour, epsilon: f64) -> Vec<Point2D> {
    let points = contour.points();
    let n = points.len();

    let anchor = points[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            anchor
                .distance(&points[a])
                .total_cmp(&anchor.distance(&points[b]))
        })
        .unwrap_or(1);

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;
    simplify_chain(points, 0, far, epsilon, &mut keep);
    simplify_chain(points, far, n, epsilon, &mut keep);

    let mut polygon: Vec<Point2D> = points
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect();

    while polygon.len() > 3 {
        let m = polygon.len();
        let weakest = (0..m)
            .map(|i| {
                let d = perpendicular_distance(
                    &polygon[i],
                    &polygon[(i + m - 1) % m],
                    &polygon[(i + 1) % m],
                );
                (i, d)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match weakest {
            Some((i, d)) if d < epsilon => {
                polygon.remove(i);
            }
            _ => break,
        }
    }

    polygon
}

/// Douglas-Peucker over `points[start..=end]`, where index `n` wraps to 0.
fn simplify_chain(points: &[Point2D], start: usize, end: usize, epsilon: f64, keep: &mut [bool]) {
    let n = points.len();
    let at = |i: usize| points[i % n];

    let mut stack = vec![(start, end)];
    while let Some((s, e)) = stack.pop() {
        if e - s < 2 {
            continue;
        }

        let mut dmax = 0.0;
        let mut index = s;
        for i in s + 1..e {
            let d = perpendicular_distance(&at(i), &at(s), &at(e));
            if d > dmax {
                index = i;
                dmax = d;
            }
        }

        if dmax > epsilon {
            keep[index % n] = true;
            stack.push((s, index));
            stack.push((index, e));
        }
    }
}

fn perpendicular_distance(p: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mag = dx.hypot(dy);
    if mag < 1e-9 {
        return p.distance(a);
    }
    (dy * p.x - dx * p.y + b.x * a.y - b.y * a.x).abs() / mag
}

/// Turn every contour that approximates to a convex quadrilateral of
/// sufficient area into a scored candidate, in discovery order.
pub fn quad_candidates(
    contours: impl IntoIterator<Item = Contour>,
    policy: &SelectionPolicy,
    image_area: f64,
) -> Vec<QuadCandidate> {
    let min_area = policy.min_area_ratio * image_area;
    let mut candidates = Vec::new();

    for (index, contour) in contours.into_iter().enumerate() {
        let epsilon = policy.approx_epsilon_ratio * contour.perimeter();
        let polygon = approximate_polygon(&contour, epsilon);
        let Ok(corners) = <[Point2D; 4]>::try_from(polygon.as_slice()) else {
            trace!(index, vertices = polygon.len(), "Not a quadrilateral");
            continue;
        };
        let Ok(quad) = Quadrilateral::new(corners) else {
            trace!(index, "Degenerate quadrilateral");
            continue;
        };
        if !quad.is_convex() {
            trace!(index, "Concave quadrilateral");
            continue;
        }
        let area = quad.area();
        if area < min_area {
            trace!(index, area, min_area, "Quadrilateral too small");
            continue;
        }

        let aspect_ratio = quad.aspect_ratio();
        let score = area * (1.0 + policy.aspect_weight * paper_closeness(aspect_ratio));
        debug!(index, area, aspect_ratio, score, "Quadrilateral candidate");
        candidates.push(QuadCandidate {
            quad,
            area,
            aspect_ratio,
            score,
            index,
        });
    }

    candidates
}

/// Pick the best-scoring candidate quadrilateral.
///
/// Scores within `tie_tolerance` of the best tie; among those the aspect
/// ratio nearest √2 wins, then the earliest contour. Fails with
/// `NoDocumentFound` when no contour qualifies.
#[instrument(skip_all, fields(image_area = image_area))]
pub fn select_quad(
    contours: impl IntoIterator<Item = Contour>,
    policy: &SelectionPolicy,
    image_area: f64,
) -> Result<Quadrilateral> {
    let candidates = quad_candidates(contours, policy, image_area);
    let best_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let cutoff = best_score * (1.0 - policy.tie_tolerance);

    let winner = candidates
        .iter()
        .filter(|c| c.score >= cutoff)
        .min_by(|a, b| {
            a.paper_distance()
                .total_cmp(&b.paper_distance())
                .then(a.index.cmp(&b.index))
        })
        .ok_or_else(|| {
            FlatscanError::NoDocumentFound(
                "no contour approximates a convex quadrilateral of sufficient size".into(),
            )
        })?;

    debug!(
        candidates = candidates.len(),
        index = winner.index,
        area = winner.area,
        aspect_ratio = winner.aspect_ratio,
        "Quadrilateral selected"
    );
    Ok(winner.quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boundary of a polygon sampled at roughly one-pixel steps.
    fn outline(vertices: &[(f64, f64)]) -> Contour {
        let mut points = Vec::new();
        for i in 0..vertices.len() {
            let (ax, ay) = vertices[i];
            let (bx, by) = vertices[(i + 1) % vertices.len()];
            let steps = (bx - ax).hypot(by - ay).ceil() as usize;
            for s in 0..steps {
                let t = s as f64 / steps as f64;
                points.push(Point2D::new(ax + t * (bx - ax), ay + t * (by - ay)));
            }
        }
        Contour::new(points).unwrap()
    }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Contour {
        outline(&[(x, y), (x + w, y), (x + w, y + h), (x, y + h)])
    }

    fn has_vertex(points: &[Point2D], x: f64, y: f64) -> bool {
        points.iter().any(|p| p.distance(&Point2D::new(x, y)) < 1e-6)
    }

    #[test]
    fn rectangle_reduces_to_its_corners() {
        let contour = rect(10.0, 20.0, 60.0, 40.0);
        let polygon = approximate_polygon(&contour, 0.02 * contour.perimeter());
        assert_eq!(polygon.len(), 4);
        for (x, y) in [(10.0, 20.0), (70.0, 20.0), (70.0, 60.0), (10.0, 60.0)] {
            assert!(has_vertex(&polygon, x, y), "missing corner ({x}, {y})");
        }
    }

    #[test]
    fn mid_edge_anchor_is_dropped() {
        // Start the loop halfway along the top edge.
        let contour = outline(&[(40.0, 0.0), (80.0, 0.0), (80.0, 50.0), (0.0, 50.0), (0.0, 0.0)]);
        let polygon = approximate_polygon(&contour, 0.02 * contour.perimeter());
        assert_eq!(polygon.len(), 4);
        assert!(!has_vertex(&polygon, 40.0, 0.0));
    }

    #[test]
    fn jagged_edges_are_smoothed() {
        let mut points = Vec::new();
        for x in 0..100 {
            points.push(Point2D::new(x as f64, (x % 2) as f64));
        }
        for y in 0..60 {
            points.push(Point2D::new(100.0, y as f64));
        }
        for x in (1..=100).rev() {
            points.push(Point2D::new(x as f64, 60.0));
        }
        for y in (1..=60).rev() {
            points.push(Point2D::new(0.0, y as f64));
        }
        let contour = Contour::new(points).unwrap();
        let polygon = approximate_polygon(&contour, 0.02 * contour.perimeter());
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn largest_quadrilateral_wins() {
        let contours = vec![rect(10.0, 10.0, 50.0, 40.0), rect(100.0, 100.0, 300.0, 200.0)];
        let quad = select_quad(contours, &SelectionPolicy::default(), 500.0 * 500.0).unwrap();
        assert!((quad.area() - 60_000.0).abs() < 1e-6);
    }

    #[test]
    fn near_tie_prefers_paper_aspect() {
        // 10000 vs 9996: within 2%, the √2-like sheet wins despite coming later.
        let contours = vec![rect(0.0, 0.0, 100.0, 100.0), rect(200.0, 0.0, 119.0, 84.0)];
        let quad = select_quad(contours, &SelectionPolicy::default(), 400.0 * 200.0).unwrap();
        assert!((quad.area() - 9996.0).abs() < 1e-6);
    }

    #[test]
    fn exact_tie_keeps_discovery_order() {
        let contours = vec![rect(0.0, 0.0, 100.0, 50.0), rect(200.0, 0.0, 100.0, 50.0)];
        let quad = select_quad(contours, &SelectionPolicy::default(), 400.0 * 100.0).unwrap();
        assert!(quad.points().iter().all(|p| p.x <= 100.0));
    }

    #[test]
    fn aspect_weight_can_outvote_area() {
        let contours = || vec![rect(0.0, 0.0, 100.0, 100.0), rect(200.0, 0.0, 110.0, 78.0)];
        let area = 400.0 * 200.0;

        let by_area = select_quad(contours(), &SelectionPolicy::default(), area).unwrap();
        assert!((by_area.area() - 10_000.0).abs() < 1e-6);

        let policy = SelectionPolicy {
            aspect_weight: 1.0,
            ..SelectionPolicy::default()
        };
        let by_shape = select_quad(contours(), &policy, area).unwrap();
        assert!((by_shape.area() - 8_580.0).abs() < 1e-6);
    }

    #[test]
    fn concave_quadrilateral_is_rejected() {
        let dart = outline(&[(0.0, 0.0), (100.0, 50.0), (0.0, 100.0), (30.0, 50.0)]);
        let err = select_quad(vec![dart], &SelectionPolicy::default(), 200.0 * 200.0).unwrap_err();
        assert!(matches!(err, FlatscanError::NoDocumentFound(_)));
    }

    #[test]
    fn triangle_and_tiny_quads_are_rejected() {
        let triangle = outline(&[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
        let tiny = rect(0.0, 0.0, 10.0, 10.0);
        let candidates = quad_candidates(
            vec![triangle, tiny],
            &SelectionPolicy::default(),
            1000.0 * 1000.0,
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn no_contours_means_no_document() {
        let err = select_quad(Vec::new(), &SelectionPolicy::default(), 100.0).unwrap_err();
        assert!(matches!(err, FlatscanError::NoDocumentFound(_)));
    }

    #[test]
    fn closeness_peaks_at_root_two() {
        assert!((paper_closeness(SQRT_2) - 1.0).abs() < 1e-12);
        assert!(paper_closeness(1.0) < paper_closeness(1.3));
        assert!(paper_closeness(2.0) < paper_closeness(1.5));
    }
}
