//! Retry with exponential backoff around one colorizer call.
//!
//! Transient failures ([`ColorizeError::is_transient`]) are retried up
//! to [`RetryConfig::max_attempts`] total attempts. The delay before
//! retry `n` is
//!
//! ```text
//! delay  = min(base_delay * 2^(n-1), max_delay)
//! jitter = random(0, delay / 4)   (when enabled)
//! ```
//!
//! Non-transient failures return immediately. Waiting goes through the
//! [`Sleeper`] trait so tests can record delays instead of sleeping.

use std::future::Future;
use std::time::Duration;

use inkstrip_pipeline::RgbaImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::colorizer::{ColorizeError, ColorizeRequest, Colorizer};

/// Serde support for `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per segment, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_ms")]
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
    /// Per-attempt timeout; expiry counts as a transient failure.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
}

impl RetryConfig {
    /// Default [`max_attempts`](Self::max_attempts).
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default [`base_delay`](Self::base_delay).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
    /// Default [`max_delay`](Self::max_delay).
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
    /// Default [`request_timeout`](Self::request_timeout).
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            jitter: true,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Something that can wait.
pub trait Sleeper {
    /// Wait for `delay`.
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Delay to wait after failed attempt number `attempt` (1-based).
#[must_use]
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let delay = config
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(config.max_delay);
    if !config.jitter {
        return delay;
    }
    let quarter = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=quarter);
    delay.saturating_add(Duration::from_millis(jitter))
}

/// What happened across all attempts of one request.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Final result: the image, or the last error seen.
    pub result: Result<RgbaImage, ColorizeError>,
    /// Attempts made.
    pub attempts: u32,
    /// Delays waited between attempts, in order.
    pub delays: Vec<Duration>,
}

/// Call `colorizer` until it succeeds, fails non-transiently, or the
/// attempt budget is spent.
pub async fn colorize_with_retry<C, S>(
    colorizer: &C,
    sleeper: &S,
    request: ColorizeRequest<'_>,
    config: &RetryConfig,
) -> RetryOutcome
where
    C: Colorizer,
    S: Sleeper,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delays = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = tokio::time::timeout(config.request_timeout, colorizer.colorize(request))
            .await
            .unwrap_or(Err(ColorizeError::Timeout));

        match result {
            Ok(image) => {
                return RetryOutcome {
                    result: Ok(image),
                    attempts: attempt,
                    delays,
                };
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(attempt, config);
                tracing::warn!(
                    segment = request.segment,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "colorization attempt failed, retrying"
                );
                delays.push(delay);
                sleeper.sleep(delay).await;
            }
            Err(err) => {
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                    delays,
                };
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use inkstrip_pipeline::Canvas;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let config = no_jitter();
        let ms: Vec<u128> = (1..=6)
            .map(|n| backoff_delay(n, &config).as_millis())
            .collect();
        assert_eq!(ms, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let config = RetryConfig::default();
        for _ in 0..50 {
            let d = backoff_delay(2, &config).as_millis();
            assert!((2000..=2500).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        assert_eq!(backoff_delay(u32::MAX, &no_jitter()), Duration::from_millis(10_000));
    }

    #[test]
    fn retry_config_json_uses_milliseconds() {
        let json = serde_json::to_value(no_jitter()).unwrap();
        assert_eq!(json["base_delay"], 1000);
        let back: RetryConfig = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(back.max_attempts, 5);
        assert_eq!(back.max_delay, RetryConfig::DEFAULT_MAX_DELAY);
    }

    /// Fails with the scripted errors, then succeeds.
    struct Scripted {
        failures: Mutex<Vec<ColorizeError>>,
        calls: Mutex<u32>,
    }

    impl Colorizer for Scripted {
        async fn colorize(&self, request: ColorizeRequest<'_>) -> Result<RgbaImage, ColorizeError> {
            *self.calls.lock().unwrap() += 1;
            let next = self.failures.lock().unwrap().pop();
            next.map_or_else(|| Ok(request.canvas.clone()), Err)
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<Duration>>);

    impl Sleeper for Recording {
        async fn sleep(&self, delay: Duration) {
            self.0.lock().unwrap().push(delay);
        }
    }

    fn request(canvas: &RgbaImage) -> ColorizeRequest<'_> {
        ColorizeRequest {
            segment: 3,
            canvas,
            size: Canvas::new(2, 2),
            instructions: "colorize",
        }
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let colorizer = Scripted {
            failures: Mutex::new(vec![ColorizeError::MissingImage]),
            calls: Mutex::new(0),
        };
        let sleeper = Recording::default();
        let canvas = RgbaImage::new(2, 2);
        let outcome = colorize_with_retry(&colorizer, &sleeper, request(&canvas), &no_jitter()).await;
        assert_eq!(outcome.result.unwrap_err(), ColorizeError::MissingImage);
        assert_eq!(outcome.attempts, 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transient_errors_exhaust_budget() {
        let colorizer = Scripted {
            failures: Mutex::new(vec![ColorizeError::RateLimited; 5]),
            calls: Mutex::new(0),
        };
        let sleeper = Recording::default();
        let canvas = RgbaImage::new(2, 2);
        let outcome = colorize_with_retry(&colorizer, &sleeper, request(&canvas), &no_jitter()).await;
        assert_eq!(outcome.result.unwrap_err(), ColorizeError::RateLimited);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(*colorizer.calls.lock().unwrap(), 3);
        assert_eq!(
            *sleeper.0.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_eq!(outcome.delays, *sleeper.0.lock().unwrap());
    }

    struct Stalled;

    impl Colorizer for Stalled {
        async fn colorize(&self, _request: ColorizeRequest<'_>) -> Result<RgbaImage, ColorizeError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_transient() {
        let config = RetryConfig {
            max_attempts: 2,
            request_timeout: Duration::from_millis(5),
            ..no_jitter()
        };
        let sleeper = Recording::default();
        let canvas = RgbaImage::new(2, 2);
        let outcome = colorize_with_retry(&Stalled, &sleeper, request(&canvas), &config).await;
        assert_eq!(outcome.result.unwrap_err(), ColorizeError::Timeout);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.delays.len(), 1);
    }
}
