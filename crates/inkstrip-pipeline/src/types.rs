//! Shared types for the inkstrip segmentation pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hold strip and
/// segment rasters without depending on `image` directly.
pub use image::RgbaImage;

/// Opaque black, used for padding and for restored structural pixels.
pub const OPAQUE_BLACK: image::Rgba<u8> = image::Rgba([0, 0, 0, 255]);

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// One input (or output) slice of the strip.
///
/// Slices are ordered by `index`, never by insertion order. The slice's
/// original height is the height of its image.
#[derive(Debug, Clone)]
pub struct Slice {
    /// Ordinal index parsed from the slice's file name.
    pub index: u64,
    /// Pixel data for the slice.
    pub image: RgbaImage,
}

impl Slice {
    /// Create a slice from its index and pixels.
    #[must_use]
    pub const fn new(index: u64, image: RgbaImage) -> Self {
        Self { index, image }
    }

    /// Height in rows.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// The single tall bitmap formed by joining every input slice.
///
/// Remembers the height each input slice contributed so the strip can
/// later be re-cut with exactly the same geometry.
#[derive(Debug, Clone)]
pub struct Strip {
    /// The assembled pixels.
    pub image: RgbaImage,
    /// Heights of the input slices, in order.
    pub slice_heights: Vec<u32>,
}

impl Strip {
    /// Total row count of the strip.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Common width of the strip.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }
}

/// A contiguous run of safe rows found by the split-point detector.
///
/// `end_row` is inclusive, so `band_height == end_row - start_row + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCandidate {
    /// First safe row of the band.
    pub start_row: u32,
    /// Last safe row of the band (inclusive).
    pub end_row: u32,
    /// Cut row: integer midpoint of the band.
    pub midpoint: u32,
    /// Number of rows in the band.
    pub band_height: u32,
}

/// Row range of a segment within the strip, before pixels are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// First strip row covered.
    pub start_row: u32,
    /// Number of rows covered.
    pub height: u32,
}

impl Span {
    /// One past the last row covered.
    #[must_use]
    pub const fn end_row(self) -> u32 {
        self.start_row + self.height
    }
}

/// A self-contained sub-region of the strip.
///
/// Owns a copy of its pixels, so its lifetime is independent of the
/// strip it was cut from.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position of the segment within the strip.
    pub span: Span,
    /// The segment's own pixels (`width × span.height`).
    pub image: RgbaImage,
}

impl Segment {
    /// First strip row of the segment.
    #[must_use]
    pub const fn start_row(&self) -> u32 {
        self.span.start_row
    }

    /// Height in rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.span.height
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }
}

/// One of the external service's fixed supported canvas sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
}

impl Canvas {
    /// 1024×1024.
    pub const SQUARE: Self = Self::new(1024, 1024);
    /// 1024×1536.
    pub const PORTRAIT: Self = Self::new(1024, 1536);
    /// 1536×1024.
    pub const LANDSCAPE: Self = Self::new(1536, 1024);

    /// Create a canvas size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Size string in the `WxH` form image services expect.
    #[must_use]
    pub fn size_label(self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// How a segment is letterboxed into a canvas, and how to undo it.
///
/// Invariant: `scaled_width <= canvas.width`, `scaled_height <=
/// canvas.height`, and `scaled_width / scaled_height` equals the
/// source aspect ratio within rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasFit {
    /// Chosen canvas.
    pub canvas: Canvas,
    /// Segment dimensions before fitting.
    pub source: Dimensions,
    /// Width of the resized segment inside the canvas.
    pub scaled_width: u32,
    /// Height of the resized segment inside the canvas.
    pub scaled_height: u32,
}

/// Thresholds for the "nothing to colorize" short-circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Dark fraction at or above which a segment is blank.
    pub blank_fraction: f64,
    /// Dark fraction at or above which a segment may be a text card.
    pub text_dark_fraction: f64,
    /// Share of non-dark pixels that must be near-white for a text card.
    pub text_white_share: f64,
    /// Minimum value on every channel for a pixel to count as near-white.
    pub near_white: u8,
}

impl ClassifierConfig {
    /// Default [`blank_fraction`](Self::blank_fraction).
    pub const DEFAULT_BLANK_FRACTION: f64 = 0.98;
    /// Default [`text_dark_fraction`](Self::text_dark_fraction).
    pub const DEFAULT_TEXT_DARK_FRACTION: f64 = 0.85;
    /// Default [`text_white_share`](Self::text_white_share).
    ///
    /// Low enough to tolerate anti-aliased glyph edges.
    pub const DEFAULT_TEXT_WHITE_SHARE: f64 = 0.60;
    /// Default [`near_white`](Self::near_white).
    pub const DEFAULT_NEAR_WHITE: u8 = 200;
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            blank_fraction: Self::DEFAULT_BLANK_FRACTION,
            text_dark_fraction: Self::DEFAULT_TEXT_DARK_FRACTION,
            text_white_share: Self::DEFAULT_TEXT_WHITE_SHARE,
            near_white: Self::DEFAULT_NEAR_WHITE,
        }
    }
}

/// Thresholds for the black restoration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Every channel must be strictly below this to count as true black.
    ///
    /// Must be stricter (lower) than [`StripConfig::dark_threshold`].
    pub true_black_threshold: u8,
    /// Side length of the square density neighborhood. Odd values keep
    /// the window centered.
    pub density_window: u32,
    /// Minimum fraction of true-black pixels in the neighborhood.
    pub min_density: f64,
    /// Minimum value on every channel for a bubble-fill pixel.
    pub bubble_white: u8,
    /// Chebyshev radius searched for bubble-fill pixels.
    pub bubble_radius: u32,
}

impl RestoreConfig {
    /// Default [`true_black_threshold`](Self::true_black_threshold).
    pub const DEFAULT_TRUE_BLACK_THRESHOLD: u8 = 10;
    /// Default [`density_window`](Self::density_window).
    pub const DEFAULT_DENSITY_WINDOW: u32 = 33;
    /// Default [`min_density`](Self::min_density).
    pub const DEFAULT_MIN_DENSITY: f64 = 0.70;
    /// Default [`bubble_white`](Self::bubble_white).
    pub const DEFAULT_BUBBLE_WHITE: u8 = 250;
    /// Default [`bubble_radius`](Self::bubble_radius).
    pub const DEFAULT_BUBBLE_RADIUS: u32 = 3;
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            true_black_threshold: Self::DEFAULT_TRUE_BLACK_THRESHOLD,
            density_window: Self::DEFAULT_DENSITY_WINDOW,
            min_density: Self::DEFAULT_MIN_DENSITY,
            bubble_white: Self::DEFAULT_BUBBLE_WHITE,
            bubble_radius: Self::DEFAULT_BUBBLE_RADIUS,
        }
    }
}

/// Configuration for the full segmentation pipeline.
///
/// The defaults are empirically tuned; override them through the
/// fields rather than editing the constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    /// Every channel must be strictly below this for a pixel to be dark.
    pub dark_threshold: u8,
    /// Minimum height of a safe band for it to become a cut point.
    pub min_gap_height: u32,
    /// Fraction of non-dark pixels a row may contain and still be safe.
    pub edge_tolerance: f64,
    /// Segments shorter than this are merged into a neighbor.
    pub min_segment_height: u32,
    /// Resize output slices to this width when set.
    pub output_width: Option<u32>,
    /// Resize output slices to this height when set.
    pub output_height: Option<u32>,
    /// Canvas sizes accepted by the colorization service.
    pub canvases: Vec<Canvas>,
    /// Score penalty per unit of upscale beyond 2×.
    pub upscale_penalty: f64,
    /// Content classifier thresholds.
    pub classifier: ClassifierConfig,
    /// Black restoration thresholds.
    pub restore: RestoreConfig,
}

impl StripConfig {
    /// Default [`dark_threshold`](Self::dark_threshold).
    pub const DEFAULT_DARK_THRESHOLD: u8 = 20;
    /// Default [`min_gap_height`](Self::min_gap_height).
    pub const DEFAULT_MIN_GAP_HEIGHT: u32 = 30;
    /// Default [`edge_tolerance`](Self::edge_tolerance).
    pub const DEFAULT_EDGE_TOLERANCE: f64 = 0.02;
    /// Default [`min_segment_height`](Self::min_segment_height).
    pub const DEFAULT_MIN_SEGMENT_HEIGHT: u32 = 200;
    /// Default [`upscale_penalty`](Self::upscale_penalty).
    pub const DEFAULT_UPSCALE_PENALTY: f64 = 1.0;
    /// Default [`canvases`](Self::canvases).
    pub const DEFAULT_CANVASES: [Canvas; 3] = [Canvas::SQUARE, Canvas::PORTRAIT, Canvas::LANDSCAPE];

    /// Check value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fractions = [
            ("edge_tolerance", self.edge_tolerance),
            ("classifier.blank_fraction", self.classifier.blank_fraction),
            (
                "classifier.text_dark_fraction",
                self.classifier.text_dark_fraction,
            ),
            (
                "classifier.text_white_share",
                self.classifier.text_white_share,
            ),
            ("restore.min_density", self.restore.min_density),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        if self.min_gap_height == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_gap_height must be at least 1".to_string(),
            ));
        }
        if self.restore.density_window == 0 {
            return Err(PipelineError::InvalidConfig(
                "restore.density_window must be at least 1".to_string(),
            ));
        }
        if self.restore.true_black_threshold >= self.dark_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "restore.true_black_threshold ({}) must be below dark_threshold ({})",
                self.restore.true_black_threshold, self.dark_threshold
            )));
        }
        if self.canvases.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one canvas size is required".to_string(),
            ));
        }
        if let Some(canvas) = self.canvases.iter().find(|c| c.width == 0 || c.height == 0) {
            return Err(PipelineError::InvalidConfig(format!(
                "canvas {} has a zero dimension",
                canvas.size_label()
            )));
        }
        if self.output_width == Some(0) || self.output_height == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "output dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            dark_threshold: Self::DEFAULT_DARK_THRESHOLD,
            min_gap_height: Self::DEFAULT_MIN_GAP_HEIGHT,
            edge_tolerance: Self::DEFAULT_EDGE_TOLERANCE,
            min_segment_height: Self::DEFAULT_MIN_SEGMENT_HEIGHT,
            output_width: None,
            output_height: None,
            canvases: Self::DEFAULT_CANVASES.to_vec(),
            upscale_penalty: Self::DEFAULT_UPSCALE_PENALTY,
            classifier: ClassifierConfig::default(),
            restore: RestoreConfig::default(),
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No slices were supplied, or a raster has zero area.
    #[error("input image data is empty")]
    EmptyInput,

    /// Configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The assembled strip would exceed the raster height limit.
    #[error("strip of {0} rows exceeds the maximum raster height")]
    StripTooTall(u64),

    /// Two rasters that must share geometry do not.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Required dimensions.
        expected: Dimensions,
        /// Dimensions received.
        actual: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strip_config_defaults() {
        let config = StripConfig::default();
        assert_eq!(config.dark_threshold, 20);
        assert_eq!(config.min_gap_height, 30);
        assert_eq!(config.canvases.len(), 3);
        assert!((config.classifier.blank_fraction - 0.98).abs() < f64::EPSILON);
        assert!((config.restore.min_density - 0.70).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_loose_restore_threshold() {
        let mut config = StripConfig::default();
        config.restore.true_black_threshold = config.dark_threshold;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_fraction_out_of_range() {
        let config = StripConfig {
            edge_tolerance: 1.5,
            ..StripConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("edge_tolerance"));
    }

    #[test]
    fn validate_rejects_empty_canvas_list() {
        let config = StripConfig {
            canvases: Vec::new(),
            ..StripConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: StripConfig =
            serde_json::from_str(r#"{"dark_threshold": 40, "min_gap_height": 12}"#).unwrap();
        assert_eq!(config.dark_threshold, 40);
        assert_eq!(config.min_gap_height, 12);
        assert_eq!(config.min_segment_height, StripConfig::DEFAULT_MIN_SEGMENT_HEIGHT);
        assert_eq!(config.canvases, StripConfig::DEFAULT_CANVASES.to_vec());
    }

    #[test]
    fn partial_nested_json_fills_defaults() {
        let config: StripConfig = serde_json::from_str(
            r#"{"restore": {"min_density": 0.6}, "classifier": {"blank_fraction": 0.9}}"#,
        )
        .unwrap();
        assert!((config.restore.min_density - 0.6).abs() < f64::EPSILON);
        assert_eq!(
            config.restore.density_window,
            RestoreConfig::DEFAULT_DENSITY_WINDOW
        );
        assert_eq!(
            config.restore.bubble_radius,
            RestoreConfig::DEFAULT_BUBBLE_RADIUS
        );
        assert!((config.classifier.blank_fraction - 0.9).abs() < f64::EPSILON);
        assert_eq!(
            config.classifier.near_white,
            ClassifierConfig::DEFAULT_NEAR_WHITE
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn span_end_row() {
        let span = Span {
            start_row: 10,
            height: 5,
        };
        assert_eq!(span.end_row(), 15);
    }

    #[test]
    fn canvas_size_label() {
        assert_eq!(Canvas::PORTRAIT.size_label(), "1024x1536");
        assert!((Canvas::LANDSCAPE.aspect_ratio() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn error_display() {
        let err = PipelineError::DimensionMismatch {
            expected: Dimensions {
                width: 2,
                height: 3,
            },
            actual: Dimensions {
                width: 4,
                height: 5,
            },
        };
        assert!(err.to_string().starts_with("dimension mismatch"));
    }
}
