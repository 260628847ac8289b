//! HTTP client for an image-edit colorization endpoint.
//!
//! Sends the canvas as a PNG in a multipart form together with the
//! instructions and target size, authenticated with a bearer token, and
//! expects a JSON body of the form `{"data": [{"b64_json": "..."}]}`.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use inkstrip_pipeline::RgbaImage;
use inkstrip_run::{ColorizeError, ColorizeRequest, Colorizer};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::IoError;

/// Default image-edit endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/images/edits";
/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-image-1";
/// Longest error body excerpt kept in error messages.
const MAX_ERROR_EXCERPT: usize = 300;

/// [`Colorizer`] backed by an HTTP image-edit API.
#[derive(Debug, Clone)]
pub struct HttpColorizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpColorizer {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingCredential`] if `api_key` is blank and
    /// [`IoError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, IoError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(IoError::MissingCredential("colorization API key"));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("inkstrip/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        })
    }
}

impl Colorizer for HttpColorizer {
    async fn colorize(&self, request: ColorizeRequest<'_>) -> Result<RgbaImage, ColorizeError> {
        let png = encode_png(request.canvas)?;
        let part = Part::bytes(png)
            .file_name("canvas.png")
            .mime_str("image/png")
            .map_err(|e| ColorizeError::Request(e.to_string()))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", request.instructions.to_string())
            .text("size", request.size.size_label())
            .text("n", "1")
            .part("image", part);

        tracing::debug!(
            segment = request.segment,
            size = %request.size.size_label(),
            endpoint = %self.endpoint,
            "sending colorization request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }
        decode_response(&body)
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ColorizeError> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| ColorizeError::Request(format!("PNG encoding failed: {e}")))?;
    Ok(bytes.into_inner())
}

fn transport_error(err: reqwest::Error) -> ColorizeError {
    if err.is_timeout() {
        ColorizeError::Timeout
    } else {
        ColorizeError::Request(err.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.chars().take(MAX_ERROR_EXCERPT).collect(),
        |parsed| parsed.error.message,
    )
}

/// Map a non-success status to the colorizer error taxonomy.
fn status_error(status: u16, body: &str) -> ColorizeError {
    let message = error_message(body);
    match status {
        408 => ColorizeError::Timeout,
        429 => ColorizeError::RateLimited,
        500..=599 => ColorizeError::Server { status },
        400 if mentions_safety(body) => ColorizeError::ContentRejected(message),
        _ => ColorizeError::Request(format!("status {status}: {message}")),
    }
}

fn mentions_safety(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("safety") || lower.contains("moderation")
}

#[derive(Deserialize)]
struct EditResponse {
    #[serde(default)]
    data: Vec<EditImage>,
}

#[derive(Deserialize)]
struct EditImage {
    b64_json: Option<String>,
}

fn decode_response(body: &str) -> Result<RgbaImage, ColorizeError> {
    let parsed: EditResponse =
        serde_json::from_str(body).map_err(|e| ColorizeError::Malformed(e.to_string()))?;
    let encoded = parsed
        .data
        .into_iter()
        .next()
        .and_then(|d| d.b64_json)
        .ok_or(ColorizeError::MissingImage)?;
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ColorizeError::Malformed(format!("bad base64 payload: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| ColorizeError::Malformed(format!("undecodable image payload: {e}")))?;
    Ok(image.into_rgba8())
}
