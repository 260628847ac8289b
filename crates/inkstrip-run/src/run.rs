//! Sequential per-segment driver.
//!
//! Segments are processed strictly in strip order: one segment's
//! colorizer call and restoration finish before the next begins, and the
//! [`ColorMemory`] produced by one segment feeds the next request.
//!
//! Transient colorizer failures that outlast the retry budget degrade the
//! segment to its original pixels. Any other colorizer failure aborts the
//! run with [`RunError::Colorize`].

use std::time::Instant;

use inkstrip_pipeline::{
    CanvasFit, PipelineError, RestoreScratch, RgbaImage, Segment, SegmentPlan, Slice,
    StripConfig, canvas,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::colorizer::{ColorizeError, ColorizeRequest, Colorizer};
use crate::memory::ColorMemory;
use crate::report::{Disposition, RunReport, SegmentReport};
use crate::retry::{RetryConfig, Sleeper, TokioSleeper, colorize_with_retry};

/// Instructions sent with every segment unless overridden.
pub const DEFAULT_INSTRUCTIONS: &str = "Colorize this black-and-white comic panel. \
Keep the line art, composition, and text exactly as they are. \
Leave pure black backgrounds and panel dividers black.";

/// Everything that tunes a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pixel pipeline settings.
    pub strip: StripConfig,
    /// Backoff settings for the colorizer.
    pub retry: RetryConfig,
    /// Base instructions; learned colors are appended per segment.
    pub instructions: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strip: StripConfig::default(),
            retry: RetryConfig::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The pixel pipeline rejected the input or configuration.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The colorizer failed in a way retries cannot fix.
    #[error("segment {segment}: {source}")]
    Colorize {
        /// Segment being processed.
        segment: usize,
        /// Underlying failure.
        #[source]
        source: ColorizeError,
    },
}

/// What a [`SegmentObserver`] sees once a segment is done.
#[derive(Debug, Clone, Copy)]
pub struct SegmentEvent<'a> {
    /// Position of the segment in the strip.
    pub index: usize,
    /// Segment pixels before colorization.
    pub original: &'a RgbaImage,
    /// The canvas sent to the colorizer, if one was sent.
    pub canvas: Option<&'a RgbaImage>,
    /// Pixels that go into the reassembled strip.
    pub output: &'a RgbaImage,
    /// Outcome.
    pub disposition: Disposition,
}

/// Hook called after every segment, in strip order.
pub trait SegmentObserver {
    /// Called once per segment.
    fn on_segment(&mut self, event: SegmentEvent<'_>);
}

impl SegmentObserver for () {
    fn on_segment(&mut self, _event: SegmentEvent<'_>) {}
}

impl<T: SegmentObserver> SegmentObserver for Option<T> {
    fn on_segment(&mut self, event: SegmentEvent<'_>) {
        if let Some(observer) = self {
            observer.on_segment(event);
        }
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutput {
    /// Output slices, numbered consecutively from the lowest input
    /// index.
    pub slices: Vec<Slice>,
    /// Per-segment report.
    pub report: RunReport,
    /// Learned colors after the last segment.
    pub memory: ColorMemory,
}

/// Drives a set of slices through the pipeline and a colorizer.
#[derive(Debug)]
pub struct Runner<'a, C, S = TokioSleeper> {
    config: &'a RunConfig,
    colorizer: &'a C,
    sleeper: S,
}

impl<'a, C: Colorizer> Runner<'a, C> {
    /// Create a runner that waits on the tokio timer between retries.
    #[must_use]
    pub const fn new(config: &'a RunConfig, colorizer: &'a C) -> Self {
        Self {
            config,
            colorizer,
            sleeper: TokioSleeper,
        }
    }
}

impl<'a, C: Colorizer, S: Sleeper> Runner<'a, C, S> {
    /// Replace the retry sleeper.
    #[must_use]
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Runner<'a, C, T> {
        Runner {
            config: self.config,
            colorizer: self.colorizer,
            sleeper,
        }
    }

    /// Process `slices` end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Pipeline`] for invalid input or configuration
    /// and [`RunError::Colorize`] for a non-transient colorizer failure.
    pub async fn run<O: SegmentObserver>(
        &self,
        slices: &[Slice],
        memory: ColorMemory,
        observer: &mut O,
    ) -> Result<RunOutput, RunError> {
        let start = Instant::now();
        let strip_config = &self.config.strip;
        let prepared = inkstrip_pipeline::prepare(slices, strip_config)?;
        info!(
            slices = slices.len(),
            height = prepared.dimensions.height,
            splits = prepared.candidates.len(),
            segments = prepared.segments.len(),
            "strip prepared"
        );

        let mut memory = memory;
        let mut scratch = RestoreScratch::new();
        let mut outputs = Vec::with_capacity(prepared.segments.len());
        let mut segment_reports = Vec::with_capacity(prepared.segments.len());
        for (index, segment) in prepared.segments.iter().enumerate() {
            let processed = self.process(index, segment, memory, &mut scratch, observer).await?;
            outputs.push(processed.image);
            segment_reports.push(processed.report);
            memory = processed.memory;
        }

        let images = inkstrip_pipeline::finish(&outputs, &prepared.slice_heights, strip_config)?;
        let first_index = slices.iter().map(|s| s.index).min().unwrap_or(0);
        let out_slices = (first_index..)
            .zip(images)
            .map(|(index, image)| Slice::new(index, image))
            .collect();

        let report = RunReport {
            slice_count: slices.len(),
            strip_height: prepared.dimensions.height,
            split_count: prepared.candidates.len(),
            segments: segment_reports,
            total_duration: start.elapsed(),
        };
        let summary = report.summary();
        info!(
            colorized = summary.colorized,
            skipped_blank = summary.skipped_blank,
            skipped_text = summary.skipped_text,
            fallback = summary.fallback,
            "run complete"
        );

        Ok(RunOutput {
            slices: out_slices,
            report,
            memory,
        })
    }

    async fn process<O: SegmentObserver>(
        &self,
        index: usize,
        segment: &Segment,
        memory: ColorMemory,
        scratch: &mut RestoreScratch,
        observer: &mut O,
    ) -> Result<Processed, RunError> {
        let fit = match inkstrip_pipeline::plan_segment(segment, &self.config.strip)? {
            SegmentPlan::Skip(reason) => {
                let disposition = Disposition::from(reason);
                info!(segment = index, disposition = disposition.label(), "segment skipped");
                observer.on_segment(SegmentEvent {
                    index,
                    original: &segment.image,
                    canvas: None,
                    output: &segment.image,
                    disposition,
                });
                return Ok(Processed {
                    image: segment.image.clone(),
                    report: skeleton(index, segment, disposition, None),
                    memory,
                });
            }
            SegmentPlan::Colorize(fit) => fit,
        };

        debug!(
            segment = index,
            canvas = %fit.canvas.size_label(),
            scaled_width = fit.scaled_width,
            scaled_height = fit.scaled_height,
            "segment fitted"
        );
        let sent = canvas::to_canvas(&segment.image, &fit)?;
        let instructions = memory.instructions(&self.config.instructions);
        let request = ColorizeRequest {
            segment: index,
            canvas: &sent,
            size: fit.canvas,
            instructions: &instructions,
        };
        let outcome =
            colorize_with_retry(self.colorizer, &self.sleeper, request, &self.config.retry).await;

        match outcome.result {
            Ok(colorized) => {
                let (restored, stats) = inkstrip_pipeline::finish_segment_with(
                    scratch,
                    &segment.image,
                    &colorized,
                    &fit,
                    &self.config.strip,
                )?;
                info!(
                    segment = index,
                    attempts = outcome.attempts,
                    repainted = stats.repainted,
                    "segment colorized"
                );
                observer.on_segment(SegmentEvent {
                    index,
                    original: &segment.image,
                    canvas: Some(&sent),
                    output: &restored,
                    disposition: Disposition::Colorized,
                });
                let memory = memory.absorb(&restored);
                let mut report = skeleton(index, segment, Disposition::Colorized, Some(&fit));
                report.attempts = outcome.attempts;
                report.retry_delays = outcome.delays;
                report.restore = Some(stats);
                Ok(Processed {
                    image: restored,
                    report,
                    memory,
                })
            }
            Err(err) if err.is_transient() => {
                warn!(
                    segment = index,
                    attempts = outcome.attempts,
                    error = %err,
                    "retries exhausted, keeping original pixels"
                );
                observer.on_segment(SegmentEvent {
                    index,
                    original: &segment.image,
                    canvas: Some(&sent),
                    output: &segment.image,
                    disposition: Disposition::Fallback,
                });
                let mut report = skeleton(index, segment, Disposition::Fallback, Some(&fit));
                report.attempts = outcome.attempts;
                report.retry_delays = outcome.delays;
                report.error = Some(err.to_string());
                Ok(Processed {
                    image: segment.image.clone(),
                    report,
                    memory,
                })
            }
            Err(source) => Err(RunError::Colorize {
                segment: index,
                source,
            }),
        }
    }
}

struct Processed {
    image: RgbaImage,
    report: SegmentReport,
    memory: ColorMemory,
}

fn skeleton(
    index: usize,
    segment: &Segment,
    disposition: Disposition,
    fit: Option<&CanvasFit>,
) -> SegmentReport {
    SegmentReport {
        index,
        span: segment.span,
        disposition,
        canvas: fit.map(|f| f.canvas),
        attempts: 0,
        retry_delays: Vec::new(),
        restore: None,
        error: None,
    }
}
