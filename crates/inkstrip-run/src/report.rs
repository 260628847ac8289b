//! Run report: what happened to every segment, plus a summary.
//!
//! Durations are serialized as whole milliseconds for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::fmt::Write as _;
use std::time::Duration;

use inkstrip_pipeline::{Canvas, RestoreStats, SkipReason, Span};
use serde::{Deserialize, Serialize};

use crate::retry::duration_ms;

/// Final outcome of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Colorized and restored.
    Colorized,
    /// Skipped as a blank divider or background.
    SkippedBlank,
    /// Skipped as a text-on-black card.
    SkippedText,
    /// Every attempt failed transiently; the original pixels were kept.
    Fallback,
}

impl Disposition {
    /// Short label for human-readable output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Colorized => "colorized",
            Self::SkippedBlank => "skipped-blank",
            Self::SkippedText => "skipped-text",
            Self::Fallback => "fallback-to-original",
        }
    }
}

impl From<SkipReason> for Disposition {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::Blank => Self::SkippedBlank,
            SkipReason::TextOnBlack => Self::SkippedText,
        }
    }
}

/// Record of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    /// Position of the segment in the strip.
    pub index: usize,
    /// Rows covered.
    pub span: Span,
    /// Outcome.
    pub disposition: Disposition,
    /// Canvas the segment was sent on, if any.
    pub canvas: Option<Canvas>,
    /// Colorizer calls made.
    pub attempts: u32,
    /// Delays waited between attempts.
    #[serde(with = "duration_list_ms")]
    pub retry_delays: Vec<Duration>,
    /// Restoration counts, for colorized segments.
    pub restore: Option<RestoreStats>,
    /// Last error, for fallback segments.
    pub error: Option<String>,
}

mod duration_list_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(list: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        list.iter()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Ok(Vec::<u64>::deserialize(deserializer)?
            .into_iter()
            .map(Duration::from_millis)
            .collect())
    }
}

/// Counts across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Segments colorized.
    pub colorized: usize,
    /// Segments skipped as blank.
    pub skipped_blank: usize,
    /// Segments skipped as text cards.
    pub skipped_text: usize,
    /// Segments that fell back to their original pixels.
    pub fallback: usize,
    /// Indices of fallback segments.
    pub fallback_indices: Vec<usize>,
}

/// Everything reported about a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of input slices.
    pub slice_count: usize,
    /// Height of the assembled strip.
    pub strip_height: u32,
    /// Split candidates found.
    pub split_count: usize,
    /// Per-segment records, in strip order.
    pub segments: Vec<SegmentReport>,
    /// Wall-clock duration of the run.
    #[serde(with = "duration_ms")]
    pub total_duration: Duration,
}

impl RunReport {
    /// Tally dispositions.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for segment in &self.segments {
            match segment.disposition {
                Disposition::Colorized => summary.colorized += 1,
                Disposition::SkippedBlank => summary.skipped_blank += 1,
                Disposition::SkippedText => summary.skipped_text += 1,
                Disposition::Fallback => {
                    summary.fallback += 1;
                    summary.fallback_indices.push(segment.index);
                }
            }
        }
        summary
    }

    /// `true` if any segment fell back to its original pixels.
    #[must_use]
    pub fn has_fallbacks(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.disposition == Disposition::Fallback)
    }

    /// Format the report for humans.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run Report\n{}", "=".repeat(60));
        let _ = writeln!(
            out,
            "Slices: {}  Strip height: {}  Splits: {}  Duration: {:.3}s",
            self.slice_count,
            self.strip_height,
            self.split_count,
            self.total_duration.as_secs_f64(),
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>5} {:>8} {:>7}  {:<22} {:>8}  {}",
            "Seg", "Start", "Height", "Disposition", "Attempts", "Canvas"
        );
        let _ = writeln!(out, "{}", "-".repeat(70));
        for s in &self.segments {
            let canvas = s.canvas.map_or_else(|| "-".to_string(), Canvas::size_label);
            let _ = writeln!(
                out,
                "{:>5} {:>8} {:>7}  {:<22} {:>8}  {canvas}",
                s.index,
                s.span.start_row,
                s.span.height,
                s.disposition.label(),
                s.attempts,
            );
        }

        let summary = self.summary();
        let _ = writeln!(out);
        let _ = write!(
            out,
            "Colorized: {}  Skipped (blank): {}  Skipped (text): {}  Fallback: {}",
            summary.colorized, summary.skipped_blank, summary.skipped_text, summary.fallback,
        );
        if !summary.fallback_indices.is_empty() {
            let indices: Vec<String> = summary
                .fallback_indices
                .iter()
                .map(ToString::to_string)
                .collect();
            let _ = write!(out, "\nFell back: segments {}", indices.join(", "));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn segment(index: usize, disposition: Disposition) -> SegmentReport {
        SegmentReport {
            index,
            span: Span {
                start_row: u32::try_from(index).unwrap() * 100,
                height: 100,
            },
            disposition,
            canvas: (disposition == Disposition::Colorized).then_some(Canvas::PORTRAIT),
            attempts: u32::from(disposition == Disposition::Colorized),
            retry_delays: Vec::new(),
            restore: None,
            error: None,
        }
    }

    fn sample() -> RunReport {
        RunReport {
            slice_count: 2,
            strip_height: 400,
            split_count: 3,
            segments: vec![
                segment(0, Disposition::Colorized),
                segment(1, Disposition::SkippedBlank),
                segment(2, Disposition::Fallback),
                segment(3, Disposition::SkippedText),
            ],
            total_duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn skip_reasons_map_to_distinct_dispositions() {
        assert_eq!(Disposition::from(SkipReason::Blank), Disposition::SkippedBlank);
        assert_eq!(
            Disposition::from(SkipReason::TextOnBlack),
            Disposition::SkippedText
        );
    }

    #[test]
    fn summary_counts_and_fallback_indices() {
        let summary = sample().summary();
        assert_eq!(summary.colorized, 1);
        assert_eq!(summary.skipped_blank, 1);
        assert_eq!(summary.skipped_text, 1);
        assert_eq!(summary.fallback, 1);
        assert_eq!(summary.fallback_indices, vec![2]);
    }

    #[test]
    fn report_lists_every_segment_and_fallbacks() {
        let text = sample().report();
        assert!(text.contains("skipped-blank"));
        assert!(text.contains("1024x1536"));
        assert!(text.contains("Fell back: segments 2"));
        assert_eq!(text.matches("fallback-to-original").count(), 1);
    }

    #[test]
    fn json_durations_are_milliseconds() {
        let mut report = sample();
        report.segments[2].retry_delays = vec![Duration::from_millis(1000), Duration::from_millis(2000)];
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_duration"], 1500);
        assert_eq!(json["segments"][2]["retry_delays"][1], 2000);
        let back: RunReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
