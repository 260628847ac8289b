//! Content classification: decide whether a segment has any artwork
//! worth sending to the colorizer.
//!
//! Two short-circuits exist. A *blank* segment is almost entirely dark
//! (a divider or solid background). A *text card* is mostly dark and
//! its remaining pixels are predominantly near-white glyphs. Both are
//! passed through unmodified.

use serde::{Deserialize, Serialize};

use crate::pixel::{fraction, is_dark, is_near_white};
use crate::types::{ClassifierConfig, RgbaImage};

/// What a segment contains, as far as colorization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    /// Real artwork: send it to the colorizer.
    Artwork,
    /// Pure divider or background.
    Blank,
    /// White text on a black card.
    TextOnBlack,
}

impl ContentKind {
    /// `true` when the segment should bypass the colorizer.
    #[must_use]
    pub const fn is_skipped(self) -> bool {
        self.skip_reason().is_some()
    }

    /// Why the segment bypasses the colorizer, or `None` for artwork.
    #[must_use]
    pub const fn skip_reason(self) -> Option<SkipReason> {
        match self {
            Self::Artwork => None,
            Self::Blank => Some(SkipReason::Blank),
            Self::TextOnBlack => Some(SkipReason::TextOnBlack),
        }
    }
}

/// The non-artwork kinds: segments passed through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Pure divider or background.
    Blank,
    /// White text on a black card.
    TextOnBlack,
}

/// Pixel tallies used by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToneCounts {
    /// All pixels in the segment.
    pub total: u64,
    /// Pixels dark on every channel.
    pub dark: u64,
    /// Non-dark pixels that are near-white on every channel.
    pub near_white: u64,
}

impl ToneCounts {
    /// Tally a segment's pixels.
    #[must_use]
    pub fn measure(image: &RgbaImage, dark_threshold: u8, near_white: u8) -> Self {
        image.pixels().fold(Self::default(), |mut counts, p| {
            counts.total += 1;
            if is_dark(p, dark_threshold) {
                counts.dark += 1;
            } else if is_near_white(p, near_white) {
                counts.near_white += 1;
            }
            counts
        })
    }

    /// Share of dark pixels over the whole segment.
    #[must_use]
    pub fn dark_fraction(&self) -> f64 {
        fraction(self.dark, self.total)
    }

    /// Share of near-white pixels among the non-dark ones.
    #[must_use]
    pub fn white_share_of_rest(&self) -> f64 {
        fraction(self.near_white, self.total - self.dark)
    }
}

/// Classify a segment.
///
/// Blank takes precedence over text, so the two outcomes never overlap.
#[must_use]
pub fn classify(image: &RgbaImage, dark_threshold: u8, config: &ClassifierConfig) -> ContentKind {
    let counts = ToneCounts::measure(image, dark_threshold, config.near_white);
    if counts.total == 0 {
        return ContentKind::Blank;
    }

    let dark = counts.dark_fraction();
    if dark >= config.blank_fraction {
        ContentKind::Blank
    } else if dark >= config.text_dark_fraction
        && counts.white_share_of_rest() >= config.text_white_share
    {
        ContentKind::TextOnBlack
    } else {
        ContentKind::Artwork
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const SKIN: Rgba<u8> = Rgba([235, 190, 160, 255]);

    /// 100×100 black image whose first `n` pixels (row-major) are `fill`,
    /// followed by `m` pixels of `other`.
    fn card(n: u32, fill: Rgba<u8>, m: u32, other: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(100, 100, |x, y| {
            let i = y * 100 + x;
            if i < n {
                fill
            } else if i < n + m {
                other
            } else {
                BLACK
            }
        })
    }

    fn run(img: &RgbaImage) -> ContentKind {
        classify(img, 20, &ClassifierConfig::default())
    }

    #[test]
    fn only_artwork_has_no_skip_reason() {
        assert_eq!(ContentKind::Artwork.skip_reason(), None);
        assert_eq!(ContentKind::Blank.skip_reason(), Some(SkipReason::Blank));
        assert_eq!(
            ContentKind::TextOnBlack.skip_reason(),
            Some(SkipReason::TextOnBlack)
        );
        assert!(!ContentKind::Artwork.is_skipped());
    }

    #[test]
    fn fully_black_is_blank() {
        assert_eq!(run(&card(0, WHITE, 0, WHITE)), ContentKind::Blank);
    }

    #[test]
    fn two_percent_art_is_still_blank() {
        assert_eq!(run(&card(200, SKIN, 0, WHITE)), ContentKind::Blank);
    }

    #[test]
    fn white_text_card_is_text() {
        // 10% non-dark, 70% of it white.
        assert_eq!(run(&card(700, WHITE, 300, SKIN)), ContentKind::TextOnBlack);
    }

    #[test]
    fn text_share_threshold_is_inclusive() {
        assert_eq!(run(&card(600, WHITE, 400, SKIN)), ContentKind::TextOnBlack);
        assert_eq!(run(&card(590, WHITE, 410, SKIN)), ContentKind::Artwork);
    }

    #[test]
    fn colored_art_on_black_is_artwork() {
        assert_eq!(run(&card(1000, SKIN, 0, WHITE)), ContentKind::Artwork);
    }

    #[test]
    fn mostly_bright_page_is_artwork() {
        let img = RgbaImage::from_pixel(50, 50, WHITE);
        assert_eq!(run(&img), ContentKind::Artwork);
    }

    #[test]
    fn skipped_kinds() {
        assert!(ContentKind::Blank.is_skipped());
        assert!(ContentKind::TextOnBlack.is_skipped());
        assert!(!ContentKind::Artwork.is_skipped());
    }
}
