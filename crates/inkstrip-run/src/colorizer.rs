//! The external colorization service, seen from this side of the wire.
//!
//! The service takes one canvas-sized bitmap plus natural-language
//! instructions and returns a same-size colorized bitmap, a content
//! rejection, or an error. This module defines the [`Colorizer`] trait
//! for pluggable backends and the error taxonomy the retry loop keys on.

use std::future::Future;

use inkstrip_pipeline::{Canvas, RgbaImage};

/// One outbound request.
#[derive(Debug, Clone, Copy)]
pub struct ColorizeRequest<'a> {
    /// Position of the segment in the strip, for logging.
    pub segment: usize,
    /// The padded canvas to colorize.
    pub canvas: &'a RgbaImage,
    /// The canvas size the service is asked to produce.
    pub size: Canvas,
    /// Instructions, including any learned colors.
    pub instructions: &'a str,
}

/// Errors returned by a colorization backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorizeError {
    /// The service asked us to slow down.
    #[error("rate limited by colorization service")]
    RateLimited,

    /// The service failed on its side.
    #[error("colorization service error (status {status})")]
    Server {
        /// HTTP-style status code.
        status: u16,
    },

    /// The request did not complete in time.
    #[error("colorization request timed out")]
    Timeout,

    /// The service refused the content on safety grounds.
    #[error("content rejected by colorization service: {0}")]
    ContentRejected(String),

    /// A response arrived without an image payload.
    #[error("colorization response contained no image")]
    MissingImage,

    /// A response arrived but could not be understood.
    #[error("malformed colorization response: {0}")]
    Malformed(String),

    /// The request itself was refused (bad parameters, auth, ...).
    #[error("colorization request failed: {0}")]
    Request(String),
}

impl ColorizeError {
    /// `true` for failures worth retrying: rate limiting, server errors,
    /// timeouts, and content-safety rejections.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server { .. } | Self::Timeout | Self::ContentRejected(_)
        )
    }
}

/// A colorization backend.
pub trait Colorizer {
    /// Colorize `request.canvas`.
    ///
    /// Implementations should return an image of `request.size`; a
    /// different size is tolerated and corrected by the caller.
    fn colorize(
        &self,
        request: ColorizeRequest<'_>,
    ) -> impl Future<Output = Result<RgbaImage, ColorizeError>> + Send;
}

/// Backend that returns the canvas unchanged.
///
/// Useful to check geometry end to end without calling a service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Colorizer for Passthrough {
    async fn colorize(&self, request: ColorizeRequest<'_>) -> Result<RgbaImage, ColorizeError> {
        Ok(request.canvas.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transient_taxonomy() {
        assert!(ColorizeError::RateLimited.is_transient());
        assert!(ColorizeError::Server { status: 503 }.is_transient());
        assert!(ColorizeError::Timeout.is_transient());
        assert!(ColorizeError::ContentRejected("nope".into()).is_transient());
        assert!(!ColorizeError::MissingImage.is_transient());
        assert!(!ColorizeError::Malformed("x".into()).is_transient());
        assert!(!ColorizeError::Request("401".into()).is_transient());
    }

    #[tokio::test]
    async fn passthrough_returns_canvas() {
        let canvas = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        let out = Passthrough
            .colorize(ColorizeRequest {
                segment: 0,
                canvas: &canvas,
                size: Canvas::new(4, 4),
                instructions: "",
            })
            .await
            .unwrap();
        assert_eq!(out.as_raw(), canvas.as_raw());
    }
}
