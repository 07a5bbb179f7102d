//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend endpoint settings.
///
/// Empty strings mean "not configured". Environment variables take priority
/// over these values, see [`crate::registry::UrlOverrides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Generic base URL shared by both backends
    pub base_url: String,

    /// Base URL of the latest backend
    pub latest_url: String,

    /// Base URL of the pinned backend
    pub pinned_url: String,

    /// Whether an unconfigured pinned backend reuses the latest URL
    pub pinned_falls_back_to_latest: bool,

    /// Loopback default used when nothing else is configured
    pub default_url: String,

    /// Display label for the pinned option
    pub pinned_label: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            latest_url: String::new(),
            pinned_url: String::new(),
            pinned_falls_back_to_latest: true,
            default_url: "http://127.0.0.1:8000".to_string(),
            pinned_label: "v1.0.0 (Pinned)".to_string(),
        }
    }
}

/// Per-call network deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Transform upload + response deadline in milliseconds
    pub transform_ms: u64,

    /// Health probe deadline in milliseconds
    pub health_ms: u64,

    /// Version probe deadline in milliseconds
    pub version_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            transform_ms: 30_000,
            health_ms: 5_000,
            version_ms: 5_000,
        }
    }
}

/// Health polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval between periodic health checks in milliseconds
    pub poll_interval_ms: u64,

    /// Interval between backend version refreshes in milliseconds
    pub version_interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            version_interval_ms: 30_000,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
        }
    }
}

/// Locally bundled backend supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Running as an installed/packaged application
    pub packaged: bool,

    /// Packaged resources directory. Defaults to `resources/` next to the executable.
    pub resources_dir: Option<PathBuf>,

    /// Development resources directory, relative to the working directory
    pub dev_resources_dir: PathBuf,

    /// Backend executable name inside `backend/<version>/`. Absolute paths are used as-is.
    pub executable: String,

    /// Arguments passed to the backend. `{port}` and `{version}` are substituted.
    pub args: Vec<String>,

    /// Loopback port the supervised backend listens on
    pub port: u16,

    /// How long a started backend has to answer its health endpoint
    pub start_timeout_ms: u64,

    /// Delay between readiness probes during startup
    pub probe_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            packaged: false,
            resources_dir: None,
            dev_resources_dir: PathBuf::from("resources"),
            executable: "prism-backend".to_string(),
            args: vec!["--port".to_string(), "{port}".to_string()],
            port: 8000,
            start_timeout_ms: 20_000,
            probe_interval_ms: 250,
        }
    }
}

/// Where per-user state lives.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the per-user data directory
    pub data_dir: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
