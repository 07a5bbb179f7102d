//! Installed-versions manifest shipped with the application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::store::DEFAULT_BACKEND_VERSION;

/// Manifest location relative to a resources directory.
pub const MANIFEST_RELATIVE_PATH: &str = "backend/versions.json";

/// Which backend versions are bundled. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default = "default_available")]
    pub available: Vec<String>,
    #[serde(default = "default_version")]
    pub default: String,
    #[serde(default = "default_version")]
    pub latest: String,
}

fn default_available() -> Vec<String> {
    vec![DEFAULT_BACKEND_VERSION.to_string()]
}

fn default_version() -> String {
    DEFAULT_BACKEND_VERSION.to_string()
}

impl Default for VersionManifest {
    /// Single-entry manifest used when nothing can be read.
    fn default() -> Self {
        Self {
            available: default_available(),
            default: default_version(),
            latest: default_version(),
        }
    }
}

impl VersionManifest {
    pub fn contains(&self, version: &str) -> bool {
        self.available.iter().any(|v| v == version)
    }
}

/// Finds the manifest in a packaged install or a development checkout.
#[derive(Debug, Clone)]
pub struct ManifestLocator {
    packaged_root: PathBuf,
    dev_root: PathBuf,
}

impl ManifestLocator {
    pub fn new(packaged_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            packaged_root: packaged_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Packaged path if it exists, else the development path if it exists,
    /// else the packaged path.
    pub fn path(&self) -> PathBuf {
        let packaged = self.packaged_root.join(MANIFEST_RELATIVE_PATH);
        if packaged.exists() {
            return packaged;
        }
        let dev = self.dev_root.join(MANIFEST_RELATIVE_PATH);
        if dev.exists() {
            dev
        } else {
            packaged
        }
    }

    /// Read the manifest; any failure yields [`VersionManifest::default`].
    pub async fn load(&self) -> VersionManifest {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No versions manifest at {}: {e}", path.display());
                return VersionManifest::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!("Failed to read versions manifest {}: {e}", path.display());
                VersionManifest::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_manifest(root: &Path, body: &str) {
        let path = root.join(MANIFEST_RELATIVE_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_missing_manifest_yields_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ManifestLocator::new(dir.path().join("packaged"), dir.path().join("dev"));
        let manifest = locator.load().await;
        assert_eq!(manifest.available, vec!["1.0.0".to_string()]);
        assert_eq!(manifest.default, "1.0.0");
        assert_eq!(manifest.latest, "1.0.0");
    }

    #[tokio::test]
    async fn test_packaged_manifest_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let packaged = dir.path().join("packaged");
        let dev = dir.path().join("dev");
        write_manifest(
            &packaged,
            r#"{"available":["1.0.0","2.0.0"],"default":"1.0.0","latest":"2.0.0"}"#,
        );
        write_manifest(&dev, r#"{"available":["9.9.9"],"default":"9.9.9","latest":"9.9.9"}"#);

        let manifest = ManifestLocator::new(&packaged, &dev).load().await;
        assert_eq!(manifest.latest, "2.0.0");
        assert!(manifest.contains("2.0.0"));
    }

    #[tokio::test]
    async fn test_dev_manifest_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev");
        write_manifest(
            &dev,
            r#"{"available":["1.0.0","1.1.0"],"default":"1.0.0","latest":"1.1.0"}"#,
        );

        let locator = ManifestLocator::new(dir.path().join("packaged"), &dev);
        assert_eq!(locator.path(), dev.join(MANIFEST_RELATIVE_PATH));
        assert_eq!(locator.load().await.latest, "1.1.0");
    }

    #[tokio::test]
    async fn test_partial_manifest_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{"latest":"2.0.0"}"#);

        let manifest = ManifestLocator::new(dir.path(), dir.path().join("dev")).load().await;
        assert_eq!(manifest.available, vec!["1.0.0".to_string()]);
        assert_eq!(manifest.default, "1.0.0");
        assert_eq!(manifest.latest, "2.0.0");
    }

    #[tokio::test]
    async fn test_corrupt_manifest_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "[1, 2");
        let manifest = ManifestLocator::new(dir.path(), dir.path().join("dev")).load().await;
        assert_eq!(manifest, VersionManifest::default());
    }
}
