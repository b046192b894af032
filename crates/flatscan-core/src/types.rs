// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Flatscan pipeline.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{FlatscanError, Result};

/// Smallest corner sine a `Quadrilateral` may have. Anything flatter is an
/// exactly degenerate corner (three points on a line up to rounding).
pub const DEGENERATE_SINE: f64 = 1e-9;

/// Minimum distance (px) between two distinct quad corners.
pub const COINCIDENT_DISTANCE: f64 = 1e-6;

// -- Bitmap -------------------------------------------------------------------

/// Immutable raster image with interleaved 8-bit channels.
///
/// Pixels are stored row-major with a fixed stride of `width * channels`
/// bytes. Supported channel counts are 1 (gray), 2 (gray + alpha), 3 (RGB)
/// and 4 (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap a pixel buffer, validating its dimensions.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FlatscanError::InvalidInput(format!(
                "bitmap has zero dimension ({width}x{height})"
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(FlatscanError::InvalidInput(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FlatscanError::InvalidInput(format!(
                "pixel buffer holds {} bytes, expected {expected} for {width}x{height}x{channels}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A bitmap with every byte set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Result<Self> {
        let len = width as usize * height as usize * channels as usize;
        Self::new(width, height, channels, vec![value; len])
    }

    /// Build a single-channel bitmap by evaluating `f` at every pixel.
    pub fn gray_from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> u8,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, 1, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Borrow the raw pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the bitmap and return its pixel buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channel values of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = y as usize * self.stride() + x as usize * self.channels as usize;
        &self.data[start..start + self.channels as usize]
    }

    /// Length of the image diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        (self.width as f64).hypot(self.height as f64)
    }

    /// Total pixel count.
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

// -- Geometry -----------------------------------------------------------------

/// A point in image-pixel coordinates with sub-pixel precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Uniformly scale both coordinates.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Z component of `(b - a) x (c - b)`: positive for a clockwise turn in image
/// coordinates (y pointing down).
pub fn turn(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x)
}

/// Absolute sine of the corner angle at `b` formed by `a -> b -> c`.
///
/// Returns 0.0 when either adjacent edge has zero length.
pub fn corner_sine(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    let len = a.distance(b) * b.distance(c);
    if len <= f64::EPSILON {
        return 0.0;
    }
    (turn(a, b, c) / len).abs()
}

/// Shoelace area of a closed polygon (vertices in order, CW or CCW).
pub fn polygon_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// Closed, ordered boundary traced from an edge map.
///
/// Always holds at least three points and never repeats a point twice in a
/// row, including across the wrap-around from last to first.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point2D>,
}

impl Contour {
    /// Build a contour, collapsing consecutive duplicates.
    pub fn new(points: Vec<Point2D>) -> Result<Self> {
        let mut deduped: Vec<Point2D> = Vec::with_capacity(points.len());
        for p in points {
            if deduped.last() != Some(&p) {
                deduped.push(p);
            }
        }
        while deduped.len() > 1 && deduped.first() == deduped.last() {
            deduped.pop();
        }
        if deduped.len() < 3 {
            return Err(FlatscanError::InvalidInput(format!(
                "contour needs at least 3 distinct points, got {}",
                deduped.len()
            )));
        }
        Ok(Self { points: deduped })
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the closed polyline, including the closing segment.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }
}

/// Four-vertex polygon in boundary order.
///
/// Coincident corners and exactly collinear consecutive triples are rejected
/// at construction, so a degenerate quad is never represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quadrilateral {
    points: [Point2D; 4],
}

impl Quadrilateral {
    pub fn new(points: [Point2D; 4]) -> Result<Self> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(FlatscanError::InvalidInput(
                "quadrilateral has a non-finite corner".into(),
            ));
        }
        for i in 0..4 {
            for j in (i + 1)..4 {
                if points[i].distance(&points[j]) < COINCIDENT_DISTANCE {
                    return Err(FlatscanError::InvalidInput(format!(
                        "quadrilateral corners {i} and {j} coincide"
                    )));
                }
            }
        }
        for i in 0..4 {
            let sine = corner_sine(&points[(i + 3) % 4], &points[i], &points[(i + 1) % 4]);
            if sine < DEGENERATE_SINE {
                return Err(FlatscanError::InvalidInput(format!(
                    "quadrilateral corner {i} is collinear with its neighbours"
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2D; 4] {
        &self.points
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Whether every corner turns the same way.
    pub fn is_convex(&self) -> bool {
        let turns: Vec<f64> = (0..4)
            .map(|i| turn(&self.points[i], &self.points[(i + 1) % 4], &self.points[(i + 2) % 4]))
            .collect();
        turns.iter().all(|t| *t > 0.0) || turns.iter().all(|t| *t < 0.0)
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Point2D {
        let sx: f64 = self.points.iter().map(|p| p.x).sum();
        let sy: f64 = self.points.iter().map(|p| p.y).sum();
        Point2D::new(sx / 4.0, sy / 4.0)
    }

    /// Long side over short side, averaging opposite edges. Always >= 1.
    pub fn aspect_ratio(&self) -> f64 {
        let edge = |i: usize| self.points[i].distance(&self.points[(i + 1) % 4]);
        let a = (edge(0) + edge(2)) / 2.0;
        let b = (edge(1) + edge(3)) / 2.0;
        a.max(b) / a.min(b).max(f64::EPSILON)
    }
}

/// Canonical role of a document corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl CornerRole {
    /// Roles in clockwise order starting at the top-left.
    pub const ALL: [CornerRole; 4] = [
        CornerRole::TopLeft,
        CornerRole::TopRight,
        CornerRole::BottomRight,
        CornerRole::BottomLeft,
    ];
}

/// A quadrilateral whose corners carry fixed roles.
///
/// Only constructible through [`from_corners`](Self::from_corners), so every
/// value is a valid non-degenerate quadrilateral in TL, TR, BR, BL order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderedQuad {
    top_left: Point2D,
    top_right: Point2D,
    bottom_right: Point2D,
    bottom_left: Point2D,
}

impl OrderedQuad {
    /// Assign roles explicitly. The corners must form a valid `Quadrilateral`
    /// in TL, TR, BR, BL order.
    pub fn from_corners(
        top_left: Point2D,
        top_right: Point2D,
        bottom_right: Point2D,
        bottom_left: Point2D,
    ) -> Result<Self> {
        Quadrilateral::new([top_left, top_right, bottom_right, bottom_left])?;
        Ok(Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        })
    }

    pub fn top_left(&self) -> Point2D {
        self.top_left
    }

    pub fn top_right(&self) -> Point2D {
        self.top_right
    }

    pub fn bottom_right(&self) -> Point2D {
        self.bottom_right
    }

    pub fn bottom_left(&self) -> Point2D {
        self.bottom_left
    }

    /// Corners as `[TL, TR, BR, BL]`.
    pub fn corners(&self) -> [Point2D; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn corner(&self, role: CornerRole) -> Point2D {
        match role {
            CornerRole::TopLeft => self.top_left,
            CornerRole::TopRight => self.top_right,
            CornerRole::BottomRight => self.bottom_right,
            CornerRole::BottomLeft => self.bottom_left,
        }
    }

    pub fn top_edge(&self) -> f64 {
        self.top_left.distance(&self.top_right)
    }

    pub fn bottom_edge(&self) -> f64 {
        self.bottom_left.distance(&self.bottom_right)
    }

    pub fn left_edge(&self) -> f64 {
        self.top_left.distance(&self.bottom_left)
    }

    pub fn right_edge(&self) -> f64 {
        self.top_right.distance(&self.bottom_right)
    }

    /// Width and height of the rectangle this quad rectifies to: the longer
    /// of each pair of opposite edges, rounded, never below one pixel.
    pub fn target_size(&self) -> (u32, u32) {
        let width = self.top_edge().max(self.bottom_edge()).round().max(1.0);
        let height = self.left_edge().max(self.right_edge()).round().max(1.0);
        (width as u32, height as u32)
    }
}

// -- Homography ---------------------------------------------------------------

/// Planar projective transform.
///
/// Never singular: construction rejects matrices whose determinant vanishes
/// relative to their magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    pub fn new(m: Matrix3<f64>) -> Result<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(FlatscanError::SingularTransform(
                "homography has non-finite coefficients".into(),
            ));
        }
        let norm = m.norm();
        let det = m.determinant();
        if norm == 0.0 || det.abs() <= f64::EPSILON * norm.powi(3) {
            return Err(FlatscanError::SingularTransform(format!(
                "homography determinant {det:e} is indistinguishable from zero"
            )));
        }
        Ok(Self { m })
    }

    /// Build from row-major coefficients.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self> {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    pub fn determinant(&self) -> f64 {
        self.m.determinant()
    }

    /// Map a point. Returns `None` when it lands on the line at infinity.
    pub fn apply(&self, p: &Point2D) -> Option<Point2D> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < 1e-12 {
            return None;
        }
        Some(Point2D::new(v.x / v.z, v.y / v.z))
    }

    pub fn inverse(&self) -> Result<Self> {
        let inv = self.m.try_inverse().ok_or_else(|| {
            FlatscanError::SingularTransform("homography has no inverse".into())
        })?;
        Self::new(inv)
    }
}
