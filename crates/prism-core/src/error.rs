//! Error types for the Prism request-orchestration core.
//!
//! Every failure a caller can observe is normalized into one of these enums
//! with a human-readable `Display` message. Nothing reaches the front end as
//! an unclassified error.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transform request failures
    #[error("{0}")]
    Transform(#[from] TransformError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// An input that violates a declared constraint. Never reaches the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported image format: {mime}. Supported formats: PNG, JPEG, WebP, GIF")]
    UnsupportedFormat { mime: String },

    #[error("Image file is too large: {size_mb:.2}MB. Maximum allowed size: {max_mb}MB")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Hue must be between -180 and 180 (got {0})")]
    Hue(f64),

    #[error("Saturation must be between 0 and 3 (got {0})")]
    Saturation(f64),

    #[error("Grayscale must be a boolean value (got {0})")]
    Grayscale(String),

    #[error("Crop shape must be one of: rectangle, square, circle, ellipse (got {0})")]
    CropShape(String),

    #[error("Crop width and height must be positive numbers (got {width}x{height})")]
    CropNotPositive { width: i64, height: i64 },

    #[error("Crop width and height must not exceed {max} pixels (got {width}x{height})")]
    CropTooLarge { width: i64, height: i64, max: i64 },

    #[error("Width and height must be positive numbers (got {width}x{height})")]
    ResizeNotPositive { width: i64, height: i64 },

    #[error("Width and height must not exceed {max} pixels (got {width}x{height})")]
    ResizeTooLarge { width: i64, height: i64, max: i64 },

    /// Untyped input that could not be read as transformation specs at all
    #[error("Malformed transformation specs: {0}")]
    Malformed(String),
}

/// Classified failure of a single transform request.
///
/// The `Display` output is the message shown to the user.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The deadline fired before a complete response arrived
    #[error("Request timed out. The server took too long to respond. Please try again.")]
    Timeout { timeout_ms: u64 },

    /// The request never reached a server
    #[error(
        "Cannot connect to the image processing server. Please ensure the backend is running at {url}"
    )]
    Connection { url: String },

    /// Non-2xx response with an extracted or fallback message
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 2xx response that does not have the expected result shape
    #[error("{0}")]
    Protocol(String),

    /// Any other transport failure, passed through
    #[error("{0}")]
    Network(String),
}

/// Failures inside the version supervisor.
///
/// These are folded into `StartOutcome` / `SetVersionOutcome` messages and
/// never escape the supervisor's public operations.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Backend executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("Failed to spawn backend {path}: {message}")]
    Spawn { path: PathBuf, message: String },

    #[error("Backend {version} exited during startup ({status})")]
    ExitedEarly { version: String, status: String },

    #[error("Backend {version} did not become healthy within {timeout_ms}ms")]
    NotReady { version: String, timeout_ms: u64 },

    #[error("Failed to persist backend version: {0}")]
    Persist(#[from] std::io::Error),
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_cite_value() {
        assert!(ValidationError::Hue(200.0).to_string().contains("Hue"));
        assert!(ValidationError::Hue(200.0).to_string().contains("200"));
        let err = ValidationError::FileTooLarge {
            size_mb: 51.5,
            max_mb: 50,
        };
        assert_eq!(
            err.to_string(),
            "Image file is too large: 51.50MB. Maximum allowed size: 50MB"
        );
    }

    #[test]
    fn test_validation_is_transparent_in_transform_error() {
        let err: TransformError = ValidationError::Saturation(4.0).into();
        assert_eq!(err.to_string(), "Saturation must be between 0 and 3 (got 4)");
    }

    #[test]
    fn test_connection_message_names_url() {
        let err = TransformError::Connection {
            url: "http://127.0.0.1:8000".to_string(),
        };
        assert!(err.to_string().ends_with("running at http://127.0.0.1:8000"));
    }

    #[test]
    fn test_top_level_wraps_transform_message() {
        let err: PrismError = TransformError::Protocol("Invalid response".into()).into();
        assert_eq!(err.to_string(), "Invalid response");
        let err: PrismError = ConfigError::ValidationError("bad".into()).into();
        assert_eq!(err.to_string(), "Configuration error: Invalid configuration: bad");
    }
}
