//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.transform_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts.transform_ms must be > 0".into(),
            ));
        }
        if self.timeouts.health_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts.health_ms must be > 0".into(),
            ));
        }
        if self.timeouts.version_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts.version_ms must be > 0".into(),
            ));
        }
        if self.health.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "health.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.health.version_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "health.version_interval_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.supervisor.port == 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.port must be > 0".into(),
            ));
        }
        if self.supervisor.start_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.start_timeout_ms must be > 0".into(),
            ));
        }
        if self.supervisor.executable.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "supervisor.executable must not be empty".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\" (got \"{}\")",
                self.logging.format
            )));
        }
        Ok(())
    }
}
