//! Transformation client: one multipart upload per transform request.
//!
//! The whole exchange (send, status, body read) runs under a single deadline.
//! When the deadline fires the in-flight future is dropped, which cancels the
//! request, and the call resolves as [`TransformError::Timeout`].

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::TransformError;
use crate::registry::BackendRegistry;
use crate::types::{CropShape, ImageFile, TransformationResult, TransformationSpecs};
use crate::validate::Validator;

/// Longest slice of a plain-text error body echoed back to the user.
const MAX_ERROR_TEXT_CHARS: usize = 200;

const INVALID_RESPONSE: &str = "Invalid response from server: missing or invalid image data";
const EMPTY_IMAGE: &str = "Server returned empty image data";

/// Transport failure reduced to what the classifier cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The deadline elapsed
    TimedOut,
    /// The request never reached a server
    Connect,
    /// Anything else, with its message
    Other(String),
}

impl NetworkFailure {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkFailure::TimedOut
        } else if err.is_connect() {
            NetworkFailure::Connect
        } else {
            NetworkFailure::Other(err.to_string())
        }
    }
}

/// Map a transport failure to the user-facing error.
///
/// Independent of any error payload the server may have sent.
pub fn classify_network_failure(
    failure: NetworkFailure,
    base_url: &str,
    timeout: Duration,
) -> TransformError {
    match failure {
        NetworkFailure::TimedOut => TransformError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        NetworkFailure::Connect => TransformError::Connection {
            url: base_url.to_string(),
        },
        NetworkFailure::Other(message) if message.is_empty() => {
            TransformError::Network("An unexpected error occurred".to_string())
        }
        NetworkFailure::Other(message) => TransformError::Network(message),
    }
}

/// Build the message for a non-2xx response.
///
/// The declared content type picks the branch. A JSON body contributes its
/// string `error` field, or nothing. Any other body is echoed (first 200
/// characters). Everything else falls back to the status code.
pub fn server_error_message(
    status: u16,
    content_type: Option<&str>,
    body: Option<&[u8]>,
) -> String {
    let fallback = format!("Server error: {status}");
    let Some(body) = body else {
        return fallback;
    };

    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        return serde_json::from_slice::<Value>(body)
            .ok()
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or(fallback);
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return fallback;
    }
    let truncated: String = text.chars().take(MAX_ERROR_TEXT_CHARS).collect();
    format!("Server error: {truncated}")
}

/// Check a 2xx body against the result shape.
///
/// `format` may be absent, null, or empty (defaults to "png") but must be a
/// string when present.
pub fn parse_transform_response(
    body: &[u8],
    crop_shape: Option<CropShape>,
) -> Result<TransformationResult, TransformError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| TransformError::Protocol(INVALID_RESPONSE.to_string()))?;

    let image = value
        .get("image")
        .and_then(Value::as_str)
        .ok_or_else(|| TransformError::Protocol(INVALID_RESPONSE.to_string()))?;

    let format = match value.get("format") {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(TransformError::Protocol(INVALID_RESPONSE.to_string())),
    };

    if image.is_empty() {
        return Err(TransformError::Protocol(EMPTY_IMAGE.to_string()));
    }

    Ok(TransformationResult {
        image: image.to_string(),
        format: if format.is_empty() {
            "png".to_string()
        } else {
            format.to_string()
        },
        crop_shape,
    })
}

/// Executes transform requests against the selected backend.
pub struct TransformClient {
    http: reqwest::Client,
    registry: Arc<BackendRegistry>,
    validator: Validator,
    timeout: Duration,
}

impl TransformClient {
    pub fn new(registry: Arc<BackendRegistry>, validator: Validator, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
            validator,
            timeout,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<BackendRegistry>) -> Self {
        Self::new(
            registry,
            Validator::new(config.limits.clone()),
            Duration::from_millis(config.timeouts.transform_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate, upload, and return the transformed image.
    ///
    /// Invalid input fails before any network activity.
    pub async fn transform(
        &self,
        file: &ImageFile,
        specs: &TransformationSpecs,
    ) -> Result<TransformationResult, TransformError> {
        self.validator.validate(file, specs)?;

        let base_url = self.registry.active_url().await;
        let start = Instant::now();
        tracing::debug!(
            "Uploading {} ({} bytes) to {base_url}/transform",
            file.name,
            file.size()
        );

        let result = match tokio::time::timeout(self.timeout, self.send(&base_url, file, specs))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(classify_network_failure(
                NetworkFailure::TimedOut,
                &base_url,
                self.timeout,
            )),
        };

        match &result {
            Ok(res) => tracing::info!(
                "Transformed {} -> {} in {}ms",
                file.name,
                res.format,
                start.elapsed().as_millis()
            ),
            Err(e) => tracing::warn!("Transform of {} failed: {e}", file.name),
        }
        result
    }

    async fn send(
        &self,
        base_url: &str,
        file: &ImageFile,
        specs: &TransformationSpecs,
    ) -> Result<TransformationResult, TransformError> {
        let network_error = |e: reqwest::Error| {
            classify_network_failure(NetworkFailure::from_reqwest(&e), base_url, self.timeout)
        };

        let specs_json = serde_json::to_string(specs)
            .map_err(|e| TransformError::Network(format!("Failed to encode specs: {e}")))?;
        let image_part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(network_error)?;
        let form = Form::new()
            .part("image", image_part)
            .text("transformations", specs_json);

        let resp = self
            .http
            .post(format!("{base_url}/transform"))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        if !status.is_success() {
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.bytes().await.ok();
            return Err(TransformError::Server {
                status: status.as_u16(),
                message: server_error_message(
                    status.as_u16(),
                    content_type.as_deref(),
                    body.as_deref(),
                ),
            });
        }

        let body = resp.bytes().await.map_err(network_error)?;
        parse_transform_response(&body, specs.active_crop_shape())
    }
}
