//! Learned-color accumulator.
//!
//! After each colorized segment, the dominant mid-tone colors of the
//! result are folded into a [`ColorMemory`], which colors the next
//! segment's instructions. The memory is a plain value threaded through
//! the segment loop: each step consumes it and returns the updated one.

use image::Rgba;
use inkstrip_pipeline::RgbaImage;
use serde::{Deserialize, Serialize};

/// Bits kept per channel when binning colors.
const BIN_BITS: u32 = 3;
/// Number of bins per channel.
const BINS: usize = 1 << BIN_BITS;
/// Pixels darker than this on every channel are ignored.
const SHADOW_CEILING: u8 = 40;
/// Pixels brighter than this on every channel are ignored.
const HIGHLIGHT_FLOOR: u8 = 215;
/// Channels closer than this are treated as the same learned color.
const SAME_COLOR_TOLERANCE: u8 = 16;

/// An RGB color remembered across segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedColor(pub [u8; 3]);

impl LearnedColor {
    /// `#rrggbb` form.
    #[must_use]
    pub fn hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    fn is_close(self, other: Self) -> bool {
        self.0
            .iter()
            .zip(other.0)
            .all(|(a, b)| a.abs_diff(b) <= SAME_COLOR_TOLERANCE)
    }
}

/// Colors learned so far, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorMemory {
    colors: Vec<LearnedColor>,
}

impl ColorMemory {
    /// Most colors kept; older entries are dropped first.
    pub const CAPACITY: usize = 12;
    /// Colors taken from a single segment.
    pub const PER_SEGMENT: usize = 3;
    /// Minimum share of counted pixels for a bin to be remembered.
    pub const MIN_SHARE: f64 = 0.01;

    /// Start from previously learned colors.
    #[must_use]
    pub fn from_colors(colors: Vec<LearnedColor>) -> Self {
        let mut memory = Self::default();
        for color in colors {
            memory.remember(color);
        }
        memory
    }

    /// Colors currently remembered.
    #[must_use]
    pub fn colors(&self) -> &[LearnedColor] {
        &self.colors
    }

    /// `true` if nothing has been learned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    fn remember(&mut self, color: LearnedColor) {
        if self.colors.iter().any(|c| c.is_close(color)) {
            return;
        }
        self.colors.push(color);
        if self.colors.len() > Self::CAPACITY {
            let excess = self.colors.len() - Self::CAPACITY;
            self.colors.drain(..excess);
        }
    }

    /// Fold the dominant colors of a colorized segment into the memory.
    #[must_use]
    pub fn absorb(mut self, colorized: &RgbaImage) -> Self {
        for color in dominant_colors(colorized, Self::PER_SEGMENT, Self::MIN_SHARE) {
            self.remember(color);
        }
        self
    }

    /// Append the remembered palette to `base` instructions.
    #[must_use]
    pub fn instructions(&self, base: &str) -> String {
        if self.colors.is_empty() {
            return base.to_string();
        }
        let palette: Vec<String> = self.colors.iter().map(|c| c.hex()).collect();
        format!(
            "{base}\n\nKeep colors consistent with earlier panels. Established palette: {}.",
            palette.join(", ")
        )
    }
}

fn counted(pixel: &Rgba<u8>) -> bool {
    let [r, g, b, a] = pixel.0;
    let dark = r < SHADOW_CEILING && g < SHADOW_CEILING && b < SHADOW_CEILING;
    let bright = r > HIGHLIGHT_FLOOR && g > HIGHLIGHT_FLOOR && b > HIGHLIGHT_FLOOR;
    a >= 128 && !dark && !bright
}

const fn bin_of(pixel: &Rgba<u8>) -> usize {
    let shift = 8 - BIN_BITS;
    let [r, g, b, _] = pixel.0;
    ((r >> shift) as usize * BINS + (g >> shift) as usize) * BINS + (b >> shift) as usize
}

/// Up to `limit` mean colors of the most populated histogram bins.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn dominant_colors(image: &RgbaImage, limit: usize, min_share: f64) -> Vec<LearnedColor> {
    // Per bin: pixel count and channel sums.
    let mut bins = vec![(0u64, [0u64; 3]); BINS * BINS * BINS];
    let mut total = 0u64;
    for pixel in image.pixels().filter(|p| counted(p)) {
        let (count, sums) = &mut bins[bin_of(pixel)];
        *count += 1;
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
        total += 1;
    }
    if total == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<&(u64, [u64; 3])> = bins
        .iter()
        .filter(|(count, _)| *count as f64 / total as f64 >= min_share)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
        .into_iter()
        .take(limit)
        .map(|(count, sums)| LearnedColor(sums.map(|s| (s / count) as u8)))
        .collect()
}
