// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-document — Finds the document in a photo and flattens it.
//
// Provides the detection pipeline (preprocess, edges, contours, quadrilateral
// selection, corner ordering), perspective rectification, and the image codec
// used by collaborators that work with encoded files.

pub mod image;
pub mod scan;

// Re-export the primary entry points so callers can use
// `flatscan_document::DocumentScanner` etc.
pub use crate::image::codec::{ImageCodec, ImageCrateCodec, OutputFormat};
pub use crate::image::overlay::highlight_document;
pub use scan::scanner::{DocumentScanner, ScanOutcome, StageImages, scan_document};
