// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end properties of the scanning pipeline on synthetic photos.

use flatscan_core::config::ScanConfig;
use flatscan_core::error::FlatscanError;
use flatscan_core::{Bitmap, OrderedQuad, Point2D, Quadrilateral};
use flatscan_document::image::ImageCodec;
use flatscan_document::{DocumentScanner, ImageCrateCodec, scan_document};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// White axis-aligned page covering `[x0, x1) x [y0, y1)` on black.
fn page_photo(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Bitmap {
    Bitmap::gray_from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            255
        } else {
            0
        }
    })
    .unwrap()
}

/// White `w` x `h` page centred in the image and rotated by `degrees`,
/// rasterised by pixel centre.
fn rotated_page(size: u32, w: f64, h: f64, degrees: f64) -> Bitmap {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let c = size as f64 / 2.0;
    Bitmap::gray_from_fn(size, size, |x, y| {
        let (dx, dy) = (x as f64 + 0.5 - c, y as f64 + 0.5 - c);
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        if u.abs() < w / 2.0 && v.abs() < h / 2.0 { 255 } else { 0 }
    })
    .unwrap()
}

/// White convex polygon (clockwise on screen) on black.
fn polygon_photo(width: u32, height: u32, corners: [Point2D; 4]) -> Bitmap {
    Bitmap::gray_from_fn(width, height, |x, y| {
        let p = Point2D::new(x as f64 + 0.5, y as f64 + 0.5);
        let inside = (0..4).all(|i| {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
        });
        if inside { 255 } else { 0 }
    })
    .unwrap()
}

/// Nearest-neighbour 2x enlargement.
fn upscale2(bitmap: &Bitmap) -> Bitmap {
    Bitmap::gray_from_fn(bitmap.width() * 2, bitmap.height() * 2, |x, y| {
        bitmap.pixel(x / 2, y / 2)[0]
    })
    .unwrap()
}

fn assert_corners_near(quad: &OrderedQuad, expected: [(f64, f64); 4], tolerance: f64) {
    for (corner, (x, y)) in quad.corners().iter().zip(expected) {
        let d = corner.distance(&Point2D::new(x, y));
        assert!(
            d <= tolerance,
            "corner ({:.1}, {:.1}) is {d:.2}px from ({x}, {y})",
            corner.x,
            corner.y
        );
    }
}

/// Pixels darker than `threshold`, ignoring a `rim`-pixel border.
fn dark_pixels(bitmap: &Bitmap, rim: u32, threshold: u8) -> Vec<(u32, u32, u8)> {
    let mut dark = Vec::new();
    for y in rim..bitmap.height() - rim {
        for x in rim..bitmap.width() - rim {
            let v = bitmap.pixel(x, y)[0];
            if v < threshold {
                dark.push((x, y, v));
            }
        }
    }
    dark
}

/// Detect the page rotated to each angle and check the area it encloses.
fn assert_area_kept(size: u32, w: f64, h: f64, angles: impl IntoIterator<Item = f64>) {
    let scanner = DocumentScanner::with_defaults();
    let mut failures = Vec::new();
    for degrees in angles {
        let quad = scanner.detect(&rotated_page(size, w, h, degrees)).unwrap();
        let convex = Quadrilateral::new(quad.corners()).unwrap();
        let ratio = convex.area() / (w * h);
        if !convex.is_convex() || (ratio - 1.0).abs() > 0.02 {
            failures.push((degrees, ratio));
        }
    }
    assert!(failures.is_empty(), "{w}x{h}: (angle, area ratio) out of range: {failures:?}");
}

/// Every 5 degrees, offset by 2.5 so near-axis angles are covered.
fn sweep(from: f64, to: f64) -> impl Iterator<Item = f64> {
    (0..)
        .map(move |k| from + 2.5 + 5.0 * k as f64)
        .take_while(move |&d| d < to)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn page_on_black_is_found_and_flattened() {
    let photo = page_photo(1000, 1000, 200, 300, 800, 700);
    let outcome = DocumentScanner::with_defaults().scan(&photo).unwrap();

    assert_corners_near(
        &outcome.quad,
        [(200.0, 300.0), (800.0, 300.0), (800.0, 700.0), (200.0, 700.0)],
        0.5,
    );

    let (w, h) = (outcome.image.width(), outcome.image.height());
    assert_eq!((w, h), (600, 400));
    let dark = dark_pixels(&outcome.image, 1, 250);
    assert!(dark.is_empty(), "{} dark pixels, first {:?}", dark.len(), &dark[..dark.len().min(8)]);
    let first_row: Vec<u8> = (0..w).map(|x| outcome.image.pixel(x, 0)[0]).collect();
    assert!(first_row.iter().all(|&v| v >= 128), "top row {:?}", &first_row[..8]);
}

#[test]
fn rescanning_is_bit_identical() {
    let photo = page_photo(400, 300, 70, 50, 330, 250);
    let scanner = DocumentScanner::with_defaults();
    let first = scanner.scan(&photo).unwrap();
    let second = scanner.scan(&photo).unwrap();
    assert_eq!(first.quad, second.quad);
    assert_eq!(first.homography, second.homography);
    assert_eq!(first.image, second.image);
}

#[test]
fn corners_scale_with_the_photo() {
    let small = page_photo(300, 240, 60, 50, 240, 190);
    let large = upscale2(&small);
    let scanner = DocumentScanner::with_defaults();

    let a = scanner.detect(&small).unwrap();
    let b = scanner.detect(&large).unwrap();
    for (p, q) in a.corners().iter().zip(b.corners()) {
        let d = p.scaled(2.0).distance(&q);
        assert!(d <= 1.0, "scaled corner off by {d:.2}px");
    }
}

#[test]
fn rotated_page_keeps_its_area_first_quadrant() {
    assert_area_kept(760, 600.0, 400.0, sweep(0.0, 90.0));
}

#[test]
fn rotated_page_keeps_its_area_second_quadrant() {
    assert_area_kept(760, 600.0, 400.0, sweep(90.0, 180.0));
}

#[test]
fn rotated_page_keeps_its_area_third_quadrant() {
    assert_area_kept(760, 600.0, 400.0, sweep(180.0, 270.0));
}

#[test]
fn rotated_page_keeps_its_area_fourth_quadrant() {
    assert_area_kept(760, 600.0, 400.0, sweep(270.0, 360.0));
}

#[test]
fn small_rotated_page_keeps_its_area() {
    assert_area_kept(400, 300.0, 212.0, sweep(0.0, 360.0));
}

#[test]
fn rotated_page_corners_are_exact() {
    let (w, h, degrees) = (600.0, 400.0, 87.5f64);
    let quad = DocumentScanner::with_defaults()
        .detect(&rotated_page(760, w, h, degrees))
        .unwrap();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let mut expected: Vec<Point2D> = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
        .iter()
        .map(|&(su, sv)| {
            let (u, v) = (su * w / 2.0, sv * h / 2.0);
            Point2D::new(380.0 + u * cos - v * sin, 380.0 + u * sin + v * cos)
        })
        .collect();
    for corner in quad.corners() {
        let (i, d) = expected
            .iter()
            .map(|e| e.distance(&corner))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert!(d <= 1.0, "corner ({:.2}, {:.2}) is {d:.2}px off", corner.x, corner.y);
        expected.remove(i);
    }
}

#[test]
fn output_keeps_the_quad_aspect() {
    let corners = [
        Point2D::new(90.0, 70.0),
        Point2D::new(500.0, 110.0),
        Point2D::new(460.0, 520.0),
        Point2D::new(70.0, 470.0),
    ];
    let photo = polygon_photo(600, 600, corners);
    let outcome = DocumentScanner::with_defaults().scan(&photo).unwrap();

    let q = &outcome.quad;
    let expected = q.top_edge().max(q.bottom_edge()) / q.left_edge().max(q.right_edge());
    let actual = outcome.image.width() as f64 / outcome.image.height() as f64;
    let rounding = 1.0 / outcome.image.height() as f64 * (1.0 + expected);
    assert!(
        (actual - expected).abs() <= rounding,
        "aspect {actual:.4} vs quad {expected:.4}"
    );

    assert_corners_near(
        q,
        [(90.0, 70.0), (500.0, 110.0), (460.0, 520.0), (70.0, 470.0)],
        1.0,
    );
}

#[test]
fn blank_photos_have_no_document() {
    let scanner = DocumentScanner::with_defaults();
    for value in [0u8, 255] {
        let photo = Bitmap::filled(300, 200, 1, value).unwrap();
        let err = scanner.scan(&photo).unwrap_err();
        assert!(
            matches!(err, FlatscanError::NoDocumentFound(_)),
            "fill {value}: {err}"
        );
    }
}

#[test]
fn nearly_collinear_corners_are_singular() {
    let photo = page_photo(300, 200, 0, 0, 300, 200);
    let quad = OrderedQuad::from_corners(
        Point2D::new(0.0, 0.0),
        Point2D::new(100.0, 0.01),
        Point2D::new(200.0, 0.0),
        Point2D::new(0.0, 100.0),
    )
    .unwrap();
    let err = DocumentScanner::with_defaults().rectify(&photo, &quad).unwrap_err();
    assert!(matches!(err, FlatscanError::SingularTransform(_)));
}

#[test]
fn dim_low_contrast_page_is_found() {
    let photo = Bitmap::gray_from_fn(400, 300, |x, y| {
        if (80..320).contains(&x) && (60..240).contains(&y) { 140 } else { 120 }
    })
    .unwrap();
    let quad = DocumentScanner::with_defaults().detect(&photo).unwrap();
    assert_corners_near(
        &quad,
        [(80.0, 60.0), (320.0, 60.0), (320.0, 240.0), (80.0, 240.0)],
        1.5,
    );
}

#[test]
fn color_photo_stays_color() {
    let mut data = Vec::with_capacity(320 * 240 * 3);
    for y in 0..240u32 {
        for x in 0..320u32 {
            let on_page = (60..260).contains(&x) && (40..200).contains(&y);
            data.extend_from_slice(if on_page { &[250, 245, 230] } else { &[20, 40, 60] });
        }
    }
    let photo = Bitmap::new(320, 240, 3, data).unwrap();
    let outcome = scan_document(&photo, &ScanConfig::default()).unwrap();
    assert_eq!(outcome.image.channels(), 3);
    let (w, h) = (outcome.image.width(), outcome.image.height());
    let centre = outcome.image.pixel(w / 2, h / 2);
    for (got, want) in centre.iter().zip([250u8, 245, 230]) {
        assert!(got.abs_diff(want) <= 1, "centre pixel {centre:?}");
    }
}

#[test]
fn concurrent_scans_agree() {
    let photo = page_photo(320, 240, 50, 40, 270, 200);
    let scanner = DocumentScanner::with_defaults();
    let expected = scanner.scan(&photo).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| scanner.scan(&photo))).collect();
        for handle in handles {
            let outcome = handle.join().unwrap().unwrap();
            assert_eq!(outcome.quad, expected.quad);
            assert_eq!(outcome.image, expected.image);
        }
    });
}

#[test]
fn rectified_output_survives_png_round_trip() {
    let photo = page_photo(200, 160, 40, 30, 160, 130);
    let outcome = DocumentScanner::with_defaults().scan(&photo).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.png");
    let codec = ImageCrateCodec;
    codec.save(&outcome.image, &path).unwrap();
    let reloaded = codec.open(&path).unwrap();
    assert_eq!(reloaded, outcome.image);
}
