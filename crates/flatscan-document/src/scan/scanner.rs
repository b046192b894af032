// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document scanner — runs the detection stages left to right and rectifies
// the detected document.

use flatscan_core::config::ScanConfig;
use flatscan_core::error::Result;
use flatscan_core::{Bitmap, Homography, OrderedQuad};
use tracing::{debug, info, instrument, warn};

use super::contours::ContourExtractor;
use super::corners::order_corners;
use super::edges::detect_edges;
use super::perspective::solve_perspective;
use super::preprocess::preprocess;
use super::quad::select_quad;
use super::refine::refine_quad;
use super::warp::warp_perspective;

/// Everything a full scan produces.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Document corners in the source image.
    pub quad: OrderedQuad,
    /// Source-to-output transform used for the warp.
    pub homography: Homography,
    /// The rectified document.
    pub image: Bitmap,
}

/// Intermediate bitmaps, for inspecting why detection did or did not work.
#[derive(Debug, Clone)]
pub struct StageImages {
    pub preprocessed: Bitmap,
    pub edges: Bitmap,
}

/// Locates a document in a photo and flattens it.
///
/// Holds only its configuration, so one scanner can serve any number of
/// threads at once.
#[derive(Debug, Clone, Default)]
pub struct DocumentScanner {
    config: ScanConfig,
}

impl DocumentScanner {
    // -- Construction ---------------------------------------------------------

    /// Create a scanner, rejecting out-of-range configuration values.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// A scanner with every setting at its default.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    // -- Pipeline -------------------------------------------------------------

    /// Find the document and return its corners.
    ///
    /// Preprocess, detect edges, trace contours, select the best
    /// quadrilateral, refine its corners against the image gradient and
    /// order them. Corners are in pipeline coordinates: pixel `(i, j)` covers
    /// `[i, i + 1) x [j, j + 1)`.
    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn detect(&self, bitmap: &Bitmap) -> Result<OrderedQuad> {
        let result = self.locate(bitmap);
        match &result {
            Ok(quad) => info!(
                top_left = ?quad.top_left(),
                top_right = ?quad.top_right(),
                bottom_right = ?quad.bottom_right(),
                bottom_left = ?quad.bottom_left(),
                "Document detected"
            ),
            Err(err) => warn!(kind = err.kind(), %err, "Detection failed"),
        }
        result
    }

    fn locate(&self, bitmap: &Bitmap) -> Result<OrderedQuad> {
        let gray = preprocess(bitmap, &self.config.preprocess)?;
        let edges = detect_edges(&gray, &self.config.edges)?;
        let contours = ContourExtractor::new(edges, &self.config.contours)?;
        let traced = select_quad(contours, &self.config.selection, bitmap.area())?;
        let inset = f64::from(self.config.edges.bridge_radius);
        let quad = refine_quad(&gray, &traced, inset, &self.config.refine)?;
        debug!(area = quad.area(), "Quadrilateral chosen");
        order_corners(&quad)
    }

    /// Warp the region bounded by `quad` into an upright rectangle.
    ///
    /// `quad` need not come from [`detect`](Self::detect); callers may adjust
    /// the corners first.
    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn rectify(&self, bitmap: &Bitmap, quad: &OrderedQuad) -> Result<Bitmap> {
        self.rectify_with_transform(bitmap, quad)
            .map(|(image, _)| image)
            .inspect_err(|err| warn!(kind = err.kind(), %err, "Rectification failed"))
    }

    fn rectify_with_transform(
        &self,
        bitmap: &Bitmap,
        quad: &OrderedQuad,
    ) -> Result<(Bitmap, Homography)> {
        let solution = solve_perspective(quad)?;
        let image = warp_perspective(
            bitmap,
            &solution.homography,
            solution.width,
            solution.height,
            &self.config.warp,
        )?;
        info!(
            out_width = solution.width,
            out_height = solution.height,
            "Document rectified"
        );
        Ok((image, solution.homography))
    }

    /// Detect and rectify in one call. Either every stage succeeds or the
    /// first failure is returned unchanged.
    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn scan(&self, bitmap: &Bitmap) -> Result<ScanOutcome> {
        let quad = self.detect(bitmap)?;
        let (image, homography) = self
            .rectify_with_transform(bitmap, &quad)
            .inspect_err(|err| warn!(kind = err.kind(), %err, "Rectification failed"))?;
        Ok(ScanOutcome {
            quad,
            homography,
            image,
        })
    }

    /// Run only the preprocessing and edge stages.
    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn debug_stages(&self, bitmap: &Bitmap) -> Result<StageImages> {
        let preprocessed = preprocess(bitmap, &self.config.preprocess)?;
        let edges = detect_edges(&preprocessed, &self.config.edges)?;
        Ok(StageImages {
            preprocessed,
            edges,
        })
    }
}

/// One-shot scan with the given configuration.
pub fn scan_document(bitmap: &Bitmap, config: &ScanConfig) -> Result<ScanOutcome> {
    DocumentScanner::new(config.clone())?.scan(bitmap)
}
