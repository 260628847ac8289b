//! inkstrip-run: drives segments through an external colorizer.
//!
//! Wraps the synchronous `inkstrip-pipeline` core with the one step that
//! suspends: the colorizer call. Adds retry with exponential backoff,
//! fallback to original pixels on exhausted transient failures, the
//! learned-color accumulator, and the run report.

pub mod colorizer;
pub mod memory;
pub mod report;
pub mod retry;
pub mod run;

pub use colorizer::{ColorizeError, ColorizeRequest, Colorizer, Passthrough};
pub use memory::{ColorMemory, LearnedColor};
pub use report::{Disposition, RunReport, RunSummary, SegmentReport};
pub use retry::{RetryConfig, RetryOutcome, Sleeper, TokioSleeper, backoff_delay, colorize_with_retry};
pub use run::{
    DEFAULT_INSTRUCTIONS, RunConfig, RunError, RunOutput, Runner, SegmentEvent, SegmentObserver,
};
