// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction — Moore-neighbour border following over a binary edge
// map, yielding one closed boundary per 8-connected edge component.

use std::iter::FusedIterator;

use flatscan_core::config::ContourConfig;
use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::{Bitmap, Contour, Point2D};
use tracing::{debug, instrument, trace};

/// Moore neighbourhood, clockwise on screen (y grows downwards):
/// E, SE, S, SW, W, NW, N, NE.
const DX: [isize; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [isize; 8] = [0, 1, 1, 1, 0, -1, -1, -1];

/// Index of the westward step in `DX`/`DY`.
const WEST: usize = 4;

const BACKGROUND: u8 = 0;
const UNVISITED: u8 = 1;
const VISITED: u8 = 2;

/// Lazy, single-pass iterator over the contours of an edge map.
///
/// Owns the edge map and marks pixels as it goes, so it cannot be restarted
/// and each edge pixel belongs to at most one contour. The whole traversal is
/// linear in the pixel count: every component is flooded once and traced once.
#[derive(Debug)]
pub struct ContourExtractor {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    cursor: usize,
    min_perimeter: f64,
    stack: Vec<usize>,
}

impl ContourExtractor {
    /// Take ownership of a binary edge map (non-zero = edge).
    #[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
    pub fn new(edges: Bitmap, config: &ContourConfig) -> Result<Self> {
        if edges.channels() != 1 {
            return Err(FlatscanError::InvalidInput(format!(
                "edge map must have one channel, got {}",
                edges.channels()
            )));
        }
        let min_perimeter = config.min_perimeter(edges.diagonal());
        debug!(min_perimeter, "Contour extraction ready");
        let (width, height) = (edges.width() as usize, edges.height() as usize);
        let cells = edges
            .into_data()
            .into_iter()
            .map(|v| if v == 0 { BACKGROUND } else { UNVISITED })
            .collect();
        Ok(Self {
            width,
            height,
            cells,
            cursor: 0,
            min_perimeter,
            stack: Vec::new(),
        })
    }

    /// Minimum closed perimeter a contour needs to be yielded.
    pub fn min_perimeter(&self) -> f64 {
        self.min_perimeter
    }

    fn is_edge(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.cells[y as usize * self.width + x as usize] != BACKGROUND
    }

    /// Mark the component containing `start` as visited. Returns its size.
    fn flood(&mut self, start: usize) -> usize {
        let mut size = 0;
        self.cells[start] = VISITED;
        self.stack.push(start);
        while let Some(idx) = self.stack.pop() {
            size += 1;
            let (x, y) = ((idx % self.width) as isize, (idx / self.width) as isize);
            for d in 0..8 {
                let (nx, ny) = (x + DX[d], y + DY[d]);
                if !self.is_edge(nx, ny) {
                    continue;
                }
                let n = ny as usize * self.width + nx as usize;
                if self.cells[n] == UNVISITED {
                    self.cells[n] = VISITED;
                    self.stack.push(n);
                }
            }
        }
        size
    }

    /// Follow the outer border of the component whose first pixel in raster
    /// order is `start`.
    ///
    /// Stops when the walk leaves `start` towards the same pixel it first
    /// moved to (Jacob's criterion), or after `step_limit` steps.
    fn trace(&self, start: usize, step_limit: usize) -> Vec<Point2D> {
        let sx = (start % self.width) as isize;
        let sy = (start / self.width) as isize;
        let mut points = vec![Point2D::new(sx as f64, sy as f64)];

        // Nothing lies west of or above the first pixel in raster order, so
        // the walk starts with its back to the west.
        let (mut x, mut y) = (sx, sy);
        let mut back = WEST;
        let mut first_move: Option<(isize, isize)> = None;

        for _ in 0..step_limit {
            let mut next = None;
            for k in 1..=8 {
                let d = (back + k) % 8;
                let (nx, ny) = (x + DX[d], y + DY[d]);
                if self.is_edge(nx, ny) {
                    next = Some((d, nx, ny));
                    break;
                }
            }
            let Some((d, nx, ny)) = next else {
                // Isolated pixel.
                break;
            };

            if (x, y) == (sx, sy) {
                match first_move {
                    None => first_move = Some((nx, ny)),
                    Some(first) if first == (nx, ny) => break,
                    Some(_) => {}
                }
            }

            // The last background cell examined, seen from the new pixel.
            let prev = (d + 7) % 8;
            let bx = x + DX[prev] - nx;
            let by = y + DY[prev] - ny;
            back = direction_of(bx, by);

            x = nx;
            y = ny;
            points.push(Point2D::new(x as f64, y as f64));
        }

        points
    }
}

/// Direction index of a unit Moore step.
fn direction_of(dx: isize, dy: isize) -> usize {
    (0..8)
        .find(|&d| DX[d] == dx && DY[d] == dy)
        .unwrap_or(WEST)
}

impl Iterator for ContourExtractor {
    type Item = Contour;

    fn next(&mut self) -> Option<Contour> {
        while self.cursor < self.cells.len() {
            let start = self.cursor;
            self.cursor += 1;
            if self.cells[start] != UNVISITED {
                continue;
            }

            let size = self.flood(start);
            let points = self.trace(start, 4 * size + 8);
            let Ok(contour) = Contour::new(points) else {
                trace!(size, "Component too small to form a contour");
                continue;
            };

            let perimeter = contour.perimeter();
            if perimeter < self.min_perimeter {
                trace!(size, perimeter, "Contour below minimum perimeter");
                continue;
            }

            debug!(
                x = start % self.width,
                y = start / self.width,
                points = contour.len(),
                perimeter,
                "Contour traced"
            );
            return Some(contour);
        }
        None
    }
}

impl FusedIterator for ContourExtractor {}

/// Convenience constructor mirroring the other stage functions.
pub fn extract_contours(edges: Bitmap, config: &ContourConfig) -> Result<ContourExtractor> {
    ContourExtractor::new(edges, config)
}
