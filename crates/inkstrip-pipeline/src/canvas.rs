//! Canvas fitting: map an arbitrary segment onto one of the colorizer's
//! fixed canvas sizes, and map the colorized canvas back afterwards.
//!
//! Outbound, the segment is resized uniformly to fit inside the canvas
//! and the right and bottom margins are padded with opaque black.
//! Inbound, the padding is cropped away and the remainder is resized
//! back to the segment's original dimensions. A returned canvas whose
//! size differs from the one sent is first resized to the expected
//! canvas, so geometry drift never surfaces as an error.

use image::imageops;

use crate::assemble::RESIZE_FILTER;
use crate::types::{Canvas, CanvasFit, Dimensions, OPAQUE_BLACK, PipelineError, RgbaImage};

/// Upscale factor beyond which a canvas is penalized.
pub const MAX_FREE_UPSCALE: f64 = 2.0;

/// Score of placing a `source`-sized segment on `canvas`. Lower is better.
///
/// Combines the absolute aspect-ratio difference with a penalty that
/// applies only when the required upscale exceeds [`MAX_FREE_UPSCALE`].
#[must_use]
pub fn fit_score(source: Dimensions, canvas: Canvas, upscale_penalty: f64) -> f64 {
    let aspect = f64::from(source.width) / f64::from(source.height);
    let scale = scale_factor(source, canvas);
    let excess = (scale - MAX_FREE_UPSCALE).max(0.0);
    (canvas.aspect_ratio() - aspect).abs() + excess * upscale_penalty
}

fn scale_factor(source: Dimensions, canvas: Canvas) -> f64 {
    (f64::from(canvas.width) / f64::from(source.width))
        .min(f64::from(canvas.height) / f64::from(source.height))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(length: u32, scale: f64, limit: u32) -> u32 {
    ((f64::from(length) * scale).round() as u32).clamp(1, limit)
}

/// Choose the best canvas for a segment and compute the letterbox.
///
/// Ties keep the earlier canvas in `canvases`.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `source` has zero area, and
/// [`PipelineError::InvalidConfig`] if `canvases` is empty.
pub fn choose_fit(
    source: Dimensions,
    canvases: &[Canvas],
    upscale_penalty: f64,
) -> Result<CanvasFit, PipelineError> {
    if source.width == 0 || source.height == 0 {
        return Err(PipelineError::EmptyInput);
    }

    let mut best: Option<(Canvas, f64)> = None;
    for &canvas in canvases {
        let score = fit_score(source, canvas, upscale_penalty);
        if best.is_none_or(|(_, s)| score < s) {
            best = Some((canvas, score));
        }
    }
    let Some((canvas, score)) = best else {
        return Err(PipelineError::InvalidConfig(
            "no canvas sizes configured".to_string(),
        ));
    };

    let scale = scale_factor(source, canvas);
    let fit = CanvasFit {
        canvas,
        source,
        scaled_width: scaled(source.width, scale, canvas.width),
        scaled_height: scaled(source.height, scale, canvas.height),
    };
    tracing::debug!(
        width = source.width,
        height = source.height,
        canvas = %canvas.size_label(),
        score,
        scale,
        "canvas chosen"
    );
    Ok(fit)
}

/// Resize a segment into its canvas and pad the margins with black.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `segment` is not the
/// size recorded in `fit.source`.
pub fn to_canvas(segment: &RgbaImage, fit: &CanvasFit) -> Result<RgbaImage, PipelineError> {
    let actual = Dimensions::of(segment);
    if actual != fit.source {
        return Err(PipelineError::DimensionMismatch {
            expected: fit.source,
            actual,
        });
    }

    let mut canvas = RgbaImage::from_pixel(fit.canvas.width, fit.canvas.height, OPAQUE_BLACK);
    if (fit.scaled_width, fit.scaled_height) == (actual.width, actual.height) {
        imageops::replace(&mut canvas, segment, 0, 0);
    } else {
        let resized = imageops::resize(segment, fit.scaled_width, fit.scaled_height, RESIZE_FILTER);
        imageops::replace(&mut canvas, &resized, 0, 0);
    }
    Ok(canvas)
}

/// Undo [`to_canvas`]: crop the padding and resize back to the source size.
///
/// A canvas of the wrong size is resized to the expected canvas first.
#[must_use = "returns the segment-sized image"]
pub fn from_canvas(canvas: &RgbaImage, fit: &CanvasFit) -> RgbaImage {
    let expected = (fit.canvas.width, fit.canvas.height);
    let resized;
    let canvas = if canvas.dimensions() == expected {
        canvas
    } else {
        tracing::debug!(
            got = ?canvas.dimensions(),
            expected = ?expected,
            "colorized canvas changed size, resizing before crop"
        );
        resized = imageops::resize(canvas, expected.0, expected.1, RESIZE_FILTER);
        &resized
    };

    let content = imageops::crop_imm(canvas, 0, 0, fit.scaled_width, fit.scaled_height).to_image();
    if (fit.scaled_width, fit.scaled_height) == (fit.source.width, fit.source.height) {
        content
    } else {
        imageops::resize(&content, fit.source.width, fit.source.height, RESIZE_FILTER)
    }
}
