//! Configuration management for Prism.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Environment overrides are applied once at load time; nothing
//! downstream re-reads the environment.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File holding the persisted backend version.
pub const VERSION_FILE_NAME: &str = "backend-config.json";

/// File holding the persisted latest/pinned choice.
pub const SELECTION_FILE_NAME: &str = "selection.json";

/// Environment variable that marks the process as a packaged install.
pub const PACKAGED_ENV: &str = "PRISM_PACKAGED";

/// Root configuration structure for Prism.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend endpoints
    pub backend: BackendConfig,

    /// Network deadlines
    pub timeouts: TimeoutsConfig,

    /// Health polling
    pub health: HealthConfig,

    /// Upload limits
    pub limits: LimitsConfig,

    /// Local backend supervision
    pub supervisor: SupervisorConfig,

    /// Per-user state location
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides that are not URL related.
    ///
    /// URL overrides are resolved separately by the backend registry.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(PACKAGED_ENV) {
            self.supervisor.packaged = matches!(value.trim(), "1" | "true" | "yes");
        }
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.prism.prism/config.toml
    /// - Linux: ~/.config/prism/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\prism\config\config.toml
    ///
    /// Falls back to ~/.prism/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "prism", "prism")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| home_fallback().join("config.toml"))
    }

    /// Per-user application data directory (with ~ expansion).
    pub fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => expand(dir),
            None => directories::ProjectDirs::from("com", "prism", "prism")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(home_fallback),
        }
    }

    /// Location of the persisted backend version.
    pub fn version_file(&self) -> PathBuf {
        self.data_dir().join(VERSION_FILE_NAME)
    }

    /// Location of the persisted latest/pinned choice.
    pub fn selection_file(&self) -> PathBuf {
        self.data_dir().join(SELECTION_FILE_NAME)
    }

    /// Packaged resources directory.
    ///
    /// Defaults to `resources/` next to the running executable.
    pub fn resources_dir(&self) -> PathBuf {
        match &self.supervisor.resources_dir {
            Some(dir) => expand(dir),
            None => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.join("resources")))
                .unwrap_or_else(|| PathBuf::from("resources")),
        }
    }

    /// Development resources directory (with ~ expansion).
    pub fn dev_resources_dir(&self) -> PathBuf {
        expand(&self.supervisor.dev_resources_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

fn home_fallback() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".prism")
}
