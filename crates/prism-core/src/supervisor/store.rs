//! Persisted backend version.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version used whenever nothing valid is stored.
pub const DEFAULT_BACKEND_VERSION: &str = "1.0.0";

#[derive(Serialize, Deserialize)]
struct StoredVersion {
    version: String,
}

/// `{"version": "..."}` file in the per-user data directory.
///
/// Last write wins; concurrent writers are not coordinated.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored version, or [`DEFAULT_BACKEND_VERSION`] on any failure.
    pub async fn load(&self) -> String {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No stored backend version at {}: {e}", self.path.display());
                return DEFAULT_BACKEND_VERSION.to_string();
            }
        };
        match serde_json::from_str::<StoredVersion>(&content) {
            Ok(stored) if !stored.version.trim().is_empty() => stored.version,
            Ok(_) => DEFAULT_BACKEND_VERSION.to_string(),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable backend config at {}: {e}",
                    self.path.display()
                );
                DEFAULT_BACKEND_VERSION.to_string()
            }
        }
    }

    /// Overwrite the stored version, creating the directory if absent.
    pub async fn save(&self, version: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string(&StoredVersion {
            version: version.to_string(),
        })?;
        tokio::fs::write(&self.path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path().join("backend-config.json"));
        assert_eq!(store.load().await, DEFAULT_BACKEND_VERSION);
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend-config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(VersionStore::new(&path).load().await, DEFAULT_BACKEND_VERSION);

        std::fs::write(&path, r#"{"version":""}"#).unwrap();
        assert_eq!(VersionStore::new(&path).load().await, DEFAULT_BACKEND_VERSION);
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app").join("backend-config.json");
        let store = VersionStore::new(&path);

        store.save("2.0.0").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"version":"2.0.0"}"#
        );
        assert_eq!(store.load().await, "2.0.0");

        store.save("2.1.0").await.unwrap();
        assert_eq!(store.load().await, "2.1.0");
    }
}
