// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge detection — Canny with thresholds derived from the image's own
// gradient histogram, followed by optional gap bridging.

use flatscan_core::config::EdgeConfig;
use flatscan_core::error::Result;
use flatscan_core::Bitmap;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::sobel_gradients;
use imageproc::morphology::dilate;
use tracing::{debug, instrument};

use crate::image::convert::bitmap_to_gray;

/// Gradient magnitudes at or below this (in Sobel units) count as flat and
/// are left out of the threshold histogram.
const FLAT_GRADIENT: f32 = 1.0;

/// Smoothing `canny` applies before differentiating. The threshold histogram
/// is built from the same smoothed image so both share units.
const CANNY_SIGMA: f32 = 1.4;

/// Thresholds chosen for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

/// Produce a binary edge map (pixels 0 or 1) from a single-channel bitmap.
///
/// Pixels whose suppressed gradient magnitude reaches the strong threshold
/// are edges; pixels above the weak threshold are kept only when they are
/// 8-connected to a strong one. Returns an all-zero map when the image has
/// no gradient strong enough to pass `min_high_threshold`.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn detect_edges(gray: &Bitmap, config: &EdgeConfig) -> Result<Bitmap> {
    let image = bitmap_to_gray(gray)?;
    let (width, height) = image.dimensions();

    let magnitude: Vec<f32> = sobel_gradients(&gaussian_blur_f32(&image, CANNY_SIGMA))
        .into_raw()
        .into_iter()
        .map(f32::from)
        .collect();

    let Some(thresholds) = adaptive_thresholds(&magnitude, config) else {
        debug!("No gradient above the strong floor; edge map is empty");
        return Bitmap::filled(width, height, 1, 0);
    };
    debug!(low = thresholds.low, high = thresholds.high, "Edge thresholds chosen");

    let mut edges = canny(&image, thresholds.low, thresholds.high);
    if config.bridge_radius > 0 {
        edges = dilate(&edges, Norm::L1, config.bridge_radius);
    }

    let data: Vec<u8> = edges.into_raw().into_iter().map(|v| u8::from(v != 0)).collect();
    let count = data.iter().filter(|&&v| v != 0).count();
    debug!(edge_pixels = count, "Edge detection complete");
    Bitmap::new(width, height, 1, data)
}

/// Derive strong and weak thresholds from the histogram of non-flat gradient
/// magnitudes. `None` when nothing can reach the strong floor.
pub fn adaptive_thresholds(magnitude: &[f32], config: &EdgeConfig) -> Option<EdgeThresholds> {
    let max = magnitude.iter().copied().fold(0f32, f32::max);
    if max <= FLAT_GRADIENT || max < config.min_high_threshold {
        return None;
    }

    let mut histogram = vec![0u64; max as usize + 1];
    let mut count = 0u64;
    for &m in magnitude {
        if m > FLAT_GRADIENT {
            histogram[m as usize] += 1;
            count += 1;
        }
    }

    let rank = ((config.high_percentile as f64 * count as f64).ceil() as u64).clamp(1, count);
    let mut cumulative = 0u64;
    let mut percentile = max;
    for (bin, &n) in histogram.iter().enumerate() {
        cumulative += n;
        if cumulative >= rank {
            percentile = bin as f32;
            break;
        }
    }

    let high = percentile.max(config.min_high_threshold);
    Some(EdgeThresholds {
        low: high * config.low_ratio,
        high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thin_config() -> EdgeConfig {
        EdgeConfig {
            bridge_radius: 0,
            ..EdgeConfig::default()
        }
    }

    fn square(size: u32, lo: u32, hi: u32) -> Bitmap {
        Bitmap::gray_from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                255
            } else {
                0
            }
        })
        .unwrap()
    }

    #[test]
    fn flat_image_has_no_edges() {
        for value in [0u8, 255] {
            let bitmap = Bitmap::filled(40, 30, 1, value).unwrap();
            let edges = detect_edges(&bitmap, &EdgeConfig::default()).unwrap();
            assert!(edges.data().iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn edge_map_is_binary() {
        let edges = detect_edges(&square(60, 15, 45), &EdgeConfig::default()).unwrap();
        assert!(edges.data().iter().all(|&v| v <= 1));
        assert!(edges.data().iter().any(|&v| v == 1));
    }

    #[test]
    fn step_edge_hugs_the_border() {
        let bitmap = square(60, 15, 45);
        let edges = detect_edges(&bitmap, &thin_config()).unwrap();
        // The middle row only crosses the two pixels either side of each border.
        let row: Vec<u32> = (0..60).filter(|&x| edges.pixel(x, 30)[0] == 1).collect();
        assert!(row.iter().any(|&x| x == 14 || x == 15), "row {row:?}");
        assert!(row.iter().any(|&x| x == 44 || x == 45), "row {row:?}");
        assert!(row.iter().all(|&x| matches!(x, 14 | 15 | 44 | 45)), "row {row:?}");
    }

    #[test]
    fn edges_trace_the_square_border() {
        let edges = detect_edges(&square(60, 15, 45), &thin_config()).unwrap();
        // Interior and far background stay clear.
        assert_eq!(edges.pixel(30, 30)[0], 0);
        assert_eq!(edges.pixel(3, 3)[0], 0);
        // Top border is marked along its length.
        for x in 20..40 {
            assert!(
                edges.pixel(x, 14)[0] == 1 || edges.pixel(x, 15)[0] == 1,
                "gap in the top border at x = {x}"
            );
        }
    }

    #[test]
    fn bridging_thickens_edges() {
        let bitmap = square(60, 15, 45);
        let thin = detect_edges(&bitmap, &thin_config()).unwrap();
        let thick = detect_edges(&bitmap, &EdgeConfig::default()).unwrap();
        let count = |b: &Bitmap| b.data().iter().filter(|&&v| v == 1).count();
        assert!(count(&thick) > count(&thin));
        assert_eq!(thick.pixel(14, 30)[0], 1);
        assert_eq!(thick.pixel(15, 30)[0], 1);
    }

    #[test]
    fn thresholds_follow_percentile_and_floor() {
        let mut magnitude = vec![0f32; 10];
        magnitude.extend((1..=100).map(|v| v as f32 + 0.5));
        let config = EdgeConfig {
            high_percentile: 0.5,
            min_high_threshold: 10.0,
            low_ratio: 0.5,
            ..EdgeConfig::default()
        };
        let t = adaptive_thresholds(&magnitude, &config).unwrap();
        // 100 non-flat values (1.5..=100.5); the 50th lands in bin 50.
        assert_eq!(t.high, 50.0);
        assert_eq!(t.low, 25.0);

        let floored = EdgeConfig {
            min_high_threshold: 90.0,
            ..config
        };
        assert_eq!(adaptive_thresholds(&magnitude, &floored).unwrap().high, 90.0);
    }

    #[test]
    fn weak_gradients_alone_yield_nothing() {
        let magnitude = vec![5f32; 100];
        assert!(adaptive_thresholds(&magnitude, &EdgeConfig::default()).is_none());
    }
}
