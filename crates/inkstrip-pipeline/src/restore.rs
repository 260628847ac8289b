//! Black restoration: force structural black back to pure black after
//! colorization, without touching dark artwork.
//!
//! All analysis runs on the **pre-colorization** segment; the colorized
//! segment is only written to. A pixel is structural black if and only
//! if all of the following hold in the original:
//!
//! 1. It is *true black*: every channel below
//!    [`RestoreConfig::true_black_threshold`].
//! 2. Its local density (share of true-black pixels in the square
//!    [`RestoreConfig::density_window`] neighborhood, clipped to the
//!    image) is at least [`RestoreConfig::min_density`]. This drops
//!    isolated line art and screentone.
//! 3. It is *edge-connected* (reachable from the image border through
//!    4-connected true-black pixels, i.e. part of a full-bleed divider
//!    or background) **or** *bubble-adjacent* (a pixel at least
//!    [`RestoreConfig::bubble_white`] on every channel lies within
//!    [`RestoreConfig::bubble_radius`]). The second case recovers the
//!    black cut off from the border by a speech bubble's white fill.
//!
//! Window sums come from integral images, so each per-pixel test is
//! constant time. Because the mask never looks at the colorized pixels,
//! restoring twice yields the same image as restoring once.

use image::{GrayImage, ImageBuffer, Luma, Rgba};
use imageproc::integral_image::integral_image;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::pixel::{is_dark, is_near_white};
use crate::types::{Dimensions, OPAQUE_BLACK, PipelineError, RestoreConfig, RgbaImage};

type Integral = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Per-pixel structural-black flags for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationMask {
    dimensions: Dimensions,
    structural: Vec<bool>,
}

impl RestorationMask {
    /// Dimensions of the segment the mask was computed from.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// `true` if the pixel at `(x, y)` is structural black.
    #[must_use]
    pub fn is_structural(&self, x: u32, y: u32) -> bool {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return false;
        }
        self.structural[index(self.dimensions.width, x, y)]
    }

    /// Number of structural pixels.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.structural.iter().filter(|s| **s).count() as u64
    }

    /// Paint every structural pixel of `target` opaque black.
    ///
    /// Returns the number of pixels whose value actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `target` is not the
    /// size of the segment the mask was computed from.
    pub fn apply(&self, target: &mut RgbaImage) -> Result<u64, PipelineError> {
        let actual = Dimensions::of(target);
        if actual != self.dimensions {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }
        Ok(paint(&self.structural, target))
    }
}

/// Counts from each stage of the mask computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestoreStats {
    /// True-black pixels in the original.
    pub true_black: u64,
    /// True-black pixels that also pass the density test.
    pub dense: u64,
    /// Dense pixels connected to the border.
    pub edge_connected: u64,
    /// Dense pixels not connected to the border but near a bubble fill.
    pub bubble_adjacent: u64,
    /// Pixels changed in the colorized image.
    pub repainted: u64,
}

const fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Sum of a binary image over the half-open box `[x0, x1) × [y0, y1)`.
fn box_sum(integral: &Integral, x0: u32, y0: u32, x1: u32, y1: u32) -> u32 {
    let at = |x, y| integral.get_pixel(x, y).0[0];
    at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0)
}

/// Half-open box of Chebyshev radius `radius` around `(x, y)`, clipped.
fn clipped_box(x: u32, y: u32, radius: u32, dims: Dimensions) -> (u32, u32, u32, u32) {
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = x.saturating_add(radius).saturating_add(1).min(dims.width);
    let y1 = y.saturating_add(radius).saturating_add(1).min(dims.height);
    (x0, y0, x1, y1)
}

/// Rewrite `buffer` as the 0/1 mask of `image` under `predicate`,
/// keeping its allocation.
fn refill(buffer: &mut GrayImage, image: &RgbaImage, predicate: impl Fn(&Rgba<u8>) -> bool) {
    let (width, height) = image.dimensions();
    let mut raw = std::mem::replace(buffer, GrayImage::new(0, 0)).into_raw();
    raw.clear();
    raw.extend(image.pixels().map(|p| u8::from(predicate(p))));
    *buffer = GrayImage::from_raw(width, height, raw).unwrap_or_else(|| GrayImage::new(width, height));
}

fn paint(structural: &[bool], target: &mut RgbaImage) -> u64 {
    let mut changed = 0;
    for (pixel, structural) in target.pixels_mut().zip(structural) {
        if *structural && *pixel != OPAQUE_BLACK {
            *pixel = OPAQUE_BLACK;
            changed += 1;
        }
    }
    changed
}

/// Labels of true-black components touching the image border.
fn border_components(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<bool> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let mut touches = vec![false; max_label as usize + 1];
    let (w, h) = labels.dimensions();
    let mut mark = |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        if label != 0 {
            touches[label as usize] = true;
        }
    };
    for x in 0..w {
        mark(x, 0);
        mark(x, h - 1);
    }
    for y in 0..h {
        mark(0, y);
        mark(w - 1, y);
    }
    touches
}

/// Working buffers for black restoration, reusable across segments.
///
/// Holds the true-black and bubble-white masks and the structural flags
/// of the last segment analyzed. Each analysis overwrites them, growing
/// the allocations only when a segment is larger than any before it.
#[derive(Debug, Clone)]
pub struct RestoreScratch {
    dark: GrayImage,
    white: GrayImage,
    structural: Vec<bool>,
}

impl Default for RestoreScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreScratch {
    /// Empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dark: GrayImage::new(0, 0),
            white: GrayImage::new(0, 0),
            structural: Vec::new(),
        }
    }

    /// Fill the buffers from `original` and return the stage counts.
    fn analyze(&mut self, original: &RgbaImage, config: &RestoreConfig) -> RestoreStats {
        let dims = Dimensions::of(original);
        let mut stats = RestoreStats::default();
        self.structural.clear();
        self.structural
            .resize(dims.width as usize * dims.height as usize, false);
        if dims.width == 0 || dims.height == 0 {
            return stats;
        }

        refill(&mut self.dark, original, |p| is_dark(p, config.true_black_threshold));
        refill(&mut self.white, original, |p| is_near_white(p, config.bubble_white));
        let dark_sums: Integral = integral_image::<_, u32>(&self.dark);
        let white_sums: Integral = integral_image::<_, u32>(&self.white);
        let labels = connected_components(&self.dark, Connectivity::Four, Luma([0u8]));
        let on_border = border_components(&labels);

        let half = config.density_window / 2;
        for (x, y, pixel) in self.dark.enumerate_pixels() {
            if pixel.0[0] == 0 {
                continue;
            }
            stats.true_black += 1;

            let (x0, y0, x1, y1) = clipped_box(x, y, half, dims);
            let area = f64::from((x1 - x0) * (y1 - y0));
            let density = f64::from(box_sum(&dark_sums, x0, y0, x1, y1)) / area;
            if density < config.min_density {
                continue;
            }
            stats.dense += 1;

            let restore = if on_border[labels.get_pixel(x, y).0[0] as usize] {
                stats.edge_connected += 1;
                true
            } else {
                let (bx0, by0, bx1, by1) = clipped_box(x, y, config.bubble_radius, dims);
                let near_bubble = box_sum(&white_sums, bx0, by0, bx1, by1) > 0;
                if near_bubble {
                    stats.bubble_adjacent += 1;
                }
                near_bubble
            };
            if restore {
                self.structural[index(dims.width, x, y)] = true;
            }
        }
        stats
    }
}

/// Compute the structural-black mask of a pre-colorization segment.
#[must_use = "returns the restoration mask and its statistics"]
pub fn compute_mask(original: &RgbaImage, config: &RestoreConfig) -> (RestorationMask, RestoreStats) {
    let mut scratch = RestoreScratch::new();
    let stats = scratch.analyze(original, config);
    (
        RestorationMask {
            dimensions: Dimensions::of(original),
            structural: scratch.structural,
        },
        stats,
    )
}

/// Restore structural black in `colorized` using `original` as reference.
///
/// Mutates `colorized` in place; every pixel outside the mask is left
/// exactly as the colorizer produced it.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two images differ
/// in size.
pub fn restore_black(
    original: &RgbaImage,
    colorized: &mut RgbaImage,
    config: &RestoreConfig,
) -> Result<RestoreStats, PipelineError> {
    restore_black_with(&mut RestoreScratch::new(), original, colorized, config)
}

/// [`restore_black`] working in caller-owned buffers.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two images differ
/// in size.
pub fn restore_black_with(
    scratch: &mut RestoreScratch,
    original: &RgbaImage,
    colorized: &mut RgbaImage,
    config: &RestoreConfig,
) -> Result<RestoreStats, PipelineError> {
    let expected = Dimensions::of(original);
    let actual = Dimensions::of(colorized);
    if expected != actual {
        return Err(PipelineError::DimensionMismatch { expected, actual });
    }

    let mut stats = scratch.analyze(original, config);
    stats.repainted = paint(&scratch.structural, colorized);
    tracing::debug!(
        true_black = stats.true_black,
        dense = stats.dense,
        edge_connected = stats.edge_connected,
        bubble_adjacent = stats.bubble_adjacent,
        repainted = stats.repainted,
        "black restoration applied"
    );
    Ok(stats)
}
