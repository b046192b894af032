// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan configuration. Every field has a documented default and may be
// overridden per invocation; nothing here is global.

use serde::{Deserialize, Serialize};

use crate::error::{FlatscanError, Result};

/// Complete configuration for one scan invocation.
///
/// Deserialization is lenient: any field missing from the JSON keeps its
/// default, so `{"edges": {"low_ratio": 0.3}}` is a valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub preprocess: PreprocessConfig,
    pub edges: EdgeConfig,
    pub contours: ContourConfig,
    pub selection: SelectionPolicy,
    pub refine: RefineConfig,
    pub warp: WarpConfig,
}

/// Grayscale, smoothing and contrast settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Gaussian sigma for noise suppression (default 1.0). Zero disables it.
    pub blur_sigma: f32,
    /// Equalize the histogram when the intensity standard deviation falls
    /// below this value (default 24.0, on a 0-255 scale).
    pub equalize_below_stddev: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            equalize_below_stddev: 24.0,
        }
    }
}

/// Double-threshold edge detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Weak threshold as a fraction of the strong threshold (default 0.4).
    pub low_ratio: f32,
    /// Percentile of the non-flat gradient magnitudes used as the strong
    /// threshold (default 0.7).
    pub high_percentile: f32,
    /// Floor for the strong threshold in Sobel units (default 40.0), so
    /// sensor noise on a flat page never becomes an edge.
    pub min_high_threshold: f32,
    /// Radius of the L1 dilation applied to the final edge map to close
    /// one-pixel breaks in document borders (default 1, 0 keeps edges thin).
    pub bridge_radius: u8,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            low_ratio: 0.4,
            high_percentile: 0.7,
            min_high_threshold: 40.0,
            bridge_radius: 1,
        }
    }
}

/// Contour tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Absolute minimum perimeter in pixels. Overrides `min_perimeter_ratio`.
    pub min_perimeter_px: Option<f64>,
    /// Minimum perimeter as a fraction of the image diagonal (default 0.25).
    pub min_perimeter_ratio: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_perimeter_px: None,
            min_perimeter_ratio: 0.25,
        }
    }
}

impl ContourConfig {
    /// Resolve the minimum perimeter for an image with the given diagonal.
    pub fn min_perimeter(&self, diagonal: f64) -> f64 {
        self.min_perimeter_px
            .unwrap_or(self.min_perimeter_ratio * diagonal)
    }
}

/// Quadrilateral approximation and scoring policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Polygon approximation tolerance as a fraction of the contour
    /// perimeter (default 0.02).
    pub approx_epsilon_ratio: f64,
    /// Candidates smaller than this fraction of the image area are ignored
    /// (default 0.01).
    pub min_area_ratio: f64,
    /// Weight of paper-like aspect ratio relative to area (default 0.0,
    /// area alone decides). Score is `area * (1 + aspect_weight * closeness)`.
    pub aspect_weight: f64,
    /// Relative score difference under which two candidates tie and the
    /// aspect ratio decides (default 0.02).
    pub tie_tolerance: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            approx_epsilon_ratio: 0.02,
            min_area_ratio: 0.01,
            aspect_weight: 0.0,
            tie_tolerance: 0.02,
        }
    }
}

/// Corner refinement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Fit each side of the selected quadrilateral to the image gradient and
    /// intersect neighbouring sides (default true). When off, corners are the
    /// traced contour vertices.
    pub enabled: bool,
    /// Distance in pixels either side of the traced border searched for the
    /// gradient peak (default 6.0).
    pub search_radius: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_radius: 6.0,
        }
    }
}

/// Resampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Fill value for destination pixels that map outside the source
    /// (default 255, white). Alpha channels are always filled opaque.
    pub background: u8,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self { background: 255 }
    }
}

impl ScanConfig {
    /// Parse a (possibly partial) JSON configuration and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject values outside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FlatscanError::InvalidInput(msg));

        if !(self.preprocess.blur_sigma >= 0.0 && self.preprocess.blur_sigma.is_finite()) {
            return invalid(format!(
                "blur_sigma must be a non-negative number, got {}",
                self.preprocess.blur_sigma
            ));
        }
        if !(self.edges.low_ratio > 0.0 && self.edges.low_ratio <= 1.0) {
            return invalid(format!(
                "low_ratio must be in (0, 1], got {}",
                self.edges.low_ratio
            ));
        }
        if !(0.0..=1.0).contains(&self.edges.high_percentile) {
            return invalid(format!(
                "high_percentile must be in [0, 1], got {}",
                self.edges.high_percentile
            ));
        }
        if !(self.edges.min_high_threshold >= 0.0) {
            return invalid(format!(
                "min_high_threshold must be non-negative, got {}",
                self.edges.min_high_threshold
            ));
        }
        if let Some(px) = self.contours.min_perimeter_px {
            if !(px >= 0.0) {
                return invalid(format!("min_perimeter_px must be non-negative, got {px}"));
            }
        }
        if !(self.contours.min_perimeter_ratio >= 0.0) {
            return invalid(format!(
                "min_perimeter_ratio must be non-negative, got {}",
                self.contours.min_perimeter_ratio
            ));
        }
        if !(self.selection.approx_epsilon_ratio > 0.0 && self.selection.approx_epsilon_ratio < 0.5)
        {
            return invalid(format!(
                "approx_epsilon_ratio must be in (0, 0.5), got {}",
                self.selection.approx_epsilon_ratio
            ));
        }
        if !(0.0..1.0).contains(&self.selection.min_area_ratio) {
            return invalid(format!(
                "min_area_ratio must be in [0, 1), got {}",
                self.selection.min_area_ratio
            ));
        }
        if !(self.selection.aspect_weight >= 0.0) {
            return invalid(format!(
                "aspect_weight must be non-negative, got {}",
                self.selection.aspect_weight
            ));
        }
        if !(0.0..1.0).contains(&self.selection.tie_tolerance) {
            return invalid(format!(
                "tie_tolerance must be in [0, 1), got {}",
                self.selection.tie_tolerance
            ));
        }
        if !(self.refine.search_radius >= 1.0 && self.refine.search_radius <= 64.0) {
            return invalid(format!(
                "search_radius must be in [1, 64], got {}",
                self.refine.search_radius
            ));
        }
        Ok(())
    }
}
