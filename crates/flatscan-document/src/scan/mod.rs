// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — preprocessing, edge detection, contour tracing,
// quadrilateral selection, corner ordering, perspective solving and warping.

pub mod contours;
pub mod corners;
pub mod edges;
pub mod perspective;
pub mod preprocess;
pub mod quad;
pub mod refine;
pub mod scanner;
pub mod warp;

pub use contours::{ContourExtractor, extract_contours};
pub use corners::order_corners;
pub use edges::detect_edges;
pub use perspective::{PerspectiveSolution, homography_from_correspondences, solve_perspective};
pub use preprocess::preprocess;
pub use quad::{QuadCandidate, approximate_polygon, select_quad};
pub use refine::refine_quad;
pub use scanner::{DocumentScanner, ScanOutcome, StageImages, scan_document};
pub use warp::warp_perspective;
