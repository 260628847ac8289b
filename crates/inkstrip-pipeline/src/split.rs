//! Split-point detection: find horizontal bands of near-uniformly dark
//! rows that are safe places to cut the strip.
//!
//! A row is *safe* when the share of its pixels that are dark (every
//! color channel below the threshold) is at least `1 - edge_tolerance`.
//! The tolerance absorbs compression noise at slice edges. Bright text
//! on a black card fails the darkness test, so rows crossing the text
//! are never safe and the card is kept in one piece.
//!
//! Consecutive safe rows form a band. Bands shorter than the minimum gap
//! height are discarded; each surviving band is cut at its integer
//! midpoint so the cut never lands on the anti-aliased band edges.

use crate::pixel::{fraction, is_dark};
use crate::types::{RgbaImage, SplitCandidate};

/// Fraction of dark pixels in each row.
#[must_use = "returns the per-row dark fractions"]
pub fn row_dark_fractions(image: &RgbaImage, dark_threshold: u8) -> Vec<f64> {
    let width = u64::from(image.width());
    image
        .rows()
        .map(|row| {
            let dark = row.filter(|p| is_dark(p, dark_threshold)).count() as u64;
            fraction(dark, width)
        })
        .collect()
}

/// Classify every row as safe or not.
#[must_use = "returns the per-row safety flags"]
pub fn safe_rows(image: &RgbaImage, dark_threshold: u8, edge_tolerance: f64) -> Vec<bool> {
    let required = 1.0 - edge_tolerance;
    row_dark_fractions(image, dark_threshold)
        .into_iter()
        .map(|f| image.width() > 0 && f >= required)
        .collect()
}

/// Collapse safe rows into bands of at least `min_gap_height` rows.
#[must_use = "returns the qualifying bands"]
pub fn collapse_runs(safe: &[bool], min_gap_height: u32) -> Vec<SplitCandidate> {
    let mut candidates = Vec::new();
    let mut run_start: Option<usize> = None;

    // A trailing sentinel closes a run that reaches the last row.
    for (row, is_safe) in safe.iter().copied().chain(std::iter::once(false)).enumerate() {
        match (run_start, is_safe) {
            (None, true) => run_start = Some(row),
            (Some(start), false) => {
                if let Some(candidate) = band(start, row - 1, min_gap_height) {
                    candidates.push(candidate);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    candidates
}

fn band(start: usize, end: usize, min_gap_height: u32) -> Option<SplitCandidate> {
    let start_row = u32::try_from(start).ok()?;
    let end_row = u32::try_from(end).ok()?;
    let band_height = end_row - start_row + 1;
    (band_height >= min_gap_height).then(|| SplitCandidate {
        start_row,
        end_row,
        midpoint: start_row + (end_row - start_row) / 2,
        band_height,
    })
}

/// Scan an assembled strip for split candidates.
#[must_use = "returns the detected split candidates"]
pub fn detect_splits(
    image: &RgbaImage,
    dark_threshold: u8,
    edge_tolerance: f64,
    min_gap_height: u32,
) -> Vec<SplitCandidate> {
    let safe = safe_rows(image, dark_threshold, edge_tolerance);
    let candidates = collapse_runs(&safe, min_gap_height);
    tracing::debug!(
        rows = safe.len(),
        safe_rows = safe.iter().filter(|s| **s).count(),
        candidates = candidates.len(),
        "split detection complete"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Bright image with black rows in `dark`.
    fn banded(width: u32, height: u32, dark: &[std::ops::Range<u32>]) -> RgbaImage {
        RgbaImage::from_fn(width, height, |_, y| {
            if dark.iter().any(|r| r.contains(&y)) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([230, 180, 140, 255])
            }
        })
    }

    #[test]
    fn band_midpoint_is_integer_center() {
        let img = banded(8, 100, &[40..80]);
        let found = detect_splits(&img, 20, 0.0, 30);
        assert_eq!(
            found,
            vec![SplitCandidate {
                start_row: 40,
                end_row: 79,
                midpoint: 59,
                band_height: 40,
            }]
        );
    }

    #[test]
    fn short_band_is_ignored() {
        let img = banded(8, 100, &[40..60]);
        assert!(detect_splits(&img, 20, 0.0, 30).is_empty());
    }

    #[test]
    fn band_reaching_last_row_is_closed() {
        let img = banded(4, 50, &[10..50]);
        let found = detect_splits(&img, 20, 0.0, 30);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].end_row, 49);
        assert_eq!(found[0].band_height, 40);
    }

    #[test]
    fn tolerance_absorbs_sparse_noise() {
        let mut img = banded(100, 60, &[0..60]);
        // One noisy pixel per row: 99% dark.
        for y in 0..60 {
            img.put_pixel(y % 100, y, Rgba([255, 255, 255, 255]));
        }
        assert!(detect_splits(&img, 20, 0.0, 30).is_empty());
        assert_eq!(detect_splits(&img, 20, 0.02, 30).len(), 1);
    }

    #[test]
    fn white_text_on_black_breaks_band() {
        let mut img = banded(100, 90, &[0..90]);
        // A line of "glyphs" across the middle rows.
        for y in 40..50 {
            for x in (10..90).step_by(3) {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let found = detect_splits(&img, 20, 0.02, 30);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.end_row < 40 || c.start_row >= 50));
    }

    #[test]
    fn candidates_satisfy_band_invariants() {
        let img = banded(6, 400, &[0..31, 100..175, 210..241, 300..400]);
        for c in detect_splits(&img, 20, 0.0, 30) {
            assert!(c.band_height >= 30);
            assert_eq!(c.band_height, c.end_row - c.start_row + 1);
            assert!(c.start_row <= c.midpoint && c.midpoint <= c.end_row);
        }
    }

    #[test]
    fn row_fractions_count_dark_pixels() {
        let img = RgbaImage::from_fn(4, 1, |x, _| {
            if x < 1 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        });
        let f = row_dark_fractions(&img, 20);
        assert!((f[0] - 0.25).abs() < f64::EPSILON);
    }
}
