//! Backend registry: the latest/pinned endpoint pair and the persisted choice
//! between them.
//!
//! URL sources are resolved once, at construction, into [`BackendUrls`].
//! The selection flag is re-read from disk on every [`BackendRegistry::active_url`]
//! call so that a switch made by another handle is picked up immediately.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{BackendConfig, Config};

/// Environment override for the latest backend URL.
pub const LATEST_URL_ENV: &str = "PRISM_API_BASE_URL_LATEST";
/// Environment override for the pinned backend URL.
pub const PINNED_URL_ENV: &str = "PRISM_API_BASE_URL_PINNED";
/// Environment override shared by both backends.
pub const GENERIC_URL_ENV: &str = "PRISM_API_BASE_URL";

/// Which of the two backends to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    #[default]
    Latest,
    Pinned,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Latest, BackendId::Pinned];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Latest => "latest",
            BackendId::Pinned => "pinned",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BackendId::Latest),
            "pinned" => Ok(BackendId::Pinned),
            other => Err(format!(
                "Unknown backend '{other}' (expected \"latest\" or \"pinned\")"
            )),
        }
    }
}

/// One entry of the backend selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendOption {
    pub id: BackendId,
    pub label: String,
    pub url: String,
}

/// URL overrides contributed by one configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOverrides {
    pub latest: Option<String>,
    pub pinned: Option<String>,
    pub generic: Option<String>,
}

impl UrlOverrides {
    /// Read overrides through a lookup function. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).and_then(non_empty);
        Self {
            latest: get(LATEST_URL_ENV),
            pinned: get(PINNED_URL_ENV),
            generic: get(GENERIC_URL_ENV),
        }
    }

    /// Overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overrides from the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            latest: non_empty(config.latest_url.clone()),
            pinned: non_empty(config.pinned_url.clone()),
            generic: non_empty(config.base_url.clone()),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.trim_end_matches('/').to_string())
    }
}

/// Resolved base URLs for both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUrls {
    pub latest: String,
    pub pinned: String,
}

impl BackendUrls {
    /// Resolve URLs from sources ordered by priority (highest first).
    ///
    /// Per backend: the first per-version override, else the first generic
    /// override, else for pinned the latest URL (when enabled), else the
    /// loopback default.
    pub fn resolve(sources: &[UrlOverrides], config: &BackendConfig) -> Self {
        let generic = sources.iter().find_map(|s| s.generic.clone());
        let default_url = config.default_url.trim_end_matches('/').to_string();

        let latest = sources
            .iter()
            .find_map(|s| s.latest.clone())
            .or_else(|| generic.clone())
            .unwrap_or_else(|| default_url.clone());

        let pinned = sources
            .iter()
            .find_map(|s| s.pinned.clone())
            .or(generic)
            .unwrap_or_else(|| {
                if config.pinned_falls_back_to_latest {
                    latest.clone()
                } else {
                    default_url
                }
            });

        Self { latest, pinned }
    }

    pub fn get(&self, id: BackendId) -> &str {
        match id {
            BackendId::Latest => &self.latest,
            BackendId::Pinned => &self.pinned,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SelectionFile {
    backend: BackendId,
}

/// Persisted latest/pinned flag.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored choice. Missing or corrupt files yield the default.
    pub async fn load(&self) -> BackendId {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<SelectionFile>(&content) {
                Ok(file) => file.backend,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring corrupt backend selection at {}: {e}",
                        self.path.display()
                    );
                    BackendId::default()
                }
            },
            Err(_) => BackendId::default(),
        }
    }

    /// Persist the choice, creating the parent directory if needed.
    pub async fn save(&self, id: BackendId) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string(&SelectionFile { backend: id })?;
        tokio::fs::write(&self.path, body).await
    }
}

/// Resolves the active backend base URL.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    urls: BackendUrls,
    pinned_label: String,
    store: SelectionStore,
}

impl BackendRegistry {
    pub fn new(urls: BackendUrls, pinned_label: impl Into<String>, store: SelectionStore) -> Self {
        Self {
            urls,
            pinned_label: pinned_label.into(),
            store,
        }
    }

    /// Build from config, layering environment overrides over the config file.
    pub fn from_config(config: &Config) -> Self {
        let sources = [
            UrlOverrides::from_env(),
            UrlOverrides::from_config(&config.backend),
        ];
        let urls = BackendUrls::resolve(&sources, &config.backend);
        tracing::debug!(latest = %urls.latest, pinned = %urls.pinned, "Resolved backend URLs");
        Self::new(
            urls,
            config.backend.pinned_label.clone(),
            SelectionStore::new(config.selection_file()),
        )
    }

    /// Base URL for a specific backend.
    pub fn resolve_url(&self, id: BackendId) -> &str {
        self.urls.get(id)
    }

    /// Currently selected backend (read from disk).
    pub async fn selected(&self) -> BackendId {
        self.store.load().await
    }

    /// Switch backends. The choice survives restarts.
    pub async fn select(&self, id: BackendId) -> std::io::Result<()> {
        self.store.save(id).await?;
        tracing::info!("Backend version set to: {id} ({})", self.resolve_url(id));
        Ok(())
    }

    /// Base URL of the currently selected backend.
    pub async fn active_url(&self) -> String {
        self.resolve_url(self.selected().await).to_string()
    }

    /// Both options with resolved URLs, independent of the selection.
    pub fn list_options(&self) -> Vec<BackendOption> {
        BackendId::ALL
            .into_iter()
            .map(|id| BackendOption {
                id,
                label: match id {
                    BackendId::Latest => "Latest".to_string(),
                    BackendId::Pinned => self.pinned_label.clone(),
                },
                url: self.resolve_url(id).to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(
        latest: Option<&str>,
        pinned: Option<&str>,
        generic: Option<&str>,
    ) -> UrlOverrides {
        UrlOverrides {
            latest: latest.map(String::from),
            pinned: pinned.map(String::from),
            generic: generic.map(String::from),
        }
    }

    #[test]
    fn test_defaults_to_loopback() {
        let urls = BackendUrls::resolve(&[], &BackendConfig::default());
        assert_eq!(urls.latest, "http://127.0.0.1:8000");
        assert_eq!(urls.pinned, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_per_version_override_beats_generic() {
        let urls = BackendUrls::resolve(
            &[overrides(Some("http://a"), Some("http://b"), Some("http://g"))],
            &BackendConfig::default(),
        );
        assert_eq!(urls.latest, "http://a");
        assert_eq!(urls.pinned, "http://b");
    }

    #[test]
    fn test_generic_override_applies_to_both() {
        let urls = BackendUrls::resolve(
            &[overrides(None, None, Some("http://g"))],
            &BackendConfig::default(),
        );
        assert_eq!(urls.latest, "http://g");
        assert_eq!(urls.pinned, "http://g");
    }

    #[test]
    fn test_pinned_falls_back_to_latest() {
        let configs = [
            overrides(Some("http://latest"), None, None),
            overrides(None, None, None),
            overrides(None, None, Some("http://g")),
        ];
        for source in configs {
            let urls = BackendUrls::resolve(&[source.clone()], &BackendConfig::default());
            assert_eq!(urls.pinned, urls.latest, "{source:?}");
        }
    }

    #[test]
    fn test_generic_override_beats_latest_fallback_for_pinned() {
        let urls = BackendUrls::resolve(
            &[overrides(Some("http://latest"), None, Some("http://g"))],
            &BackendConfig::default(),
        );
        assert_eq!(urls.latest, "http://latest");
        assert_eq!(urls.pinned, "http://g");
    }

    #[test]
    fn test_pinned_fallback_can_be_disabled() {
        let config = BackendConfig {
            pinned_falls_back_to_latest: false,
            ..BackendConfig::default()
        };
        let urls = BackendUrls::resolve(&[overrides(Some("http://latest"), None, None)], &config);
        assert_eq!(urls.latest, "http://latest");
        assert_eq!(urls.pinned, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_higher_priority_source_wins() {
        let env = overrides(None, Some("http://env-pinned"), None);
        let file = overrides(Some("http://file-latest"), Some("http://file-pinned"), None);
        let urls = BackendUrls::resolve(&[env, file], &BackendConfig::default());
        assert_eq!(urls.latest, "http://file-latest");
        assert_eq!(urls.pinned, "http://env-pinned");
    }

    #[test]
    fn test_per_version_in_lower_source_beats_generic_in_higher() {
        let env = overrides(None, None, Some("http://env-generic"));
        let file = overrides(Some("http://file-latest"), None, None);
        let urls = BackendUrls::resolve(&[env, file], &BackendConfig::default());
        assert_eq!(urls.latest, "http://file-latest");
        assert_eq!(urls.pinned, "http://env-generic");
    }

    #[test]
    fn test_from_lookup_ignores_empty_and_trims_slash() {
        let source = UrlOverrides::from_lookup(|key| match key {
            LATEST_URL_ENV => Some("http://host:9000/".to_string()),
            PINNED_URL_ENV => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(source, overrides(Some("http://host:9000"), None, None));
    }

    #[test]
    fn test_backend_id_parse() {
        assert_eq!("latest".parse::<BackendId>(), Ok(BackendId::Latest));
        assert_eq!("pinned".parse::<BackendId>(), Ok(BackendId::Pinned));
        assert!("beta".parse::<BackendId>().is_err());
    }

    fn registry_in(dir: &Path) -> BackendRegistry {
        BackendRegistry::new(
            BackendUrls {
                latest: "http://latest".to_string(),
                pinned: "http://pinned".to_string(),
            },
            "v1.0.0 (Pinned)",
            SelectionStore::new(dir.join("state").join(crate::config::SELECTION_FILE_NAME)),
        )
    }

    #[tokio::test]
    async fn test_selection_defaults_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        assert_eq!(registry.selected().await, BackendId::Latest);
        assert_eq!(registry.active_url().await, "http://latest");
    }

    #[tokio::test]
    async fn test_selection_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        registry_in(dir.path())
            .select(BackendId::Pinned)
            .await
            .unwrap();

        let reopened = registry_in(dir.path());
        assert_eq!(reopened.selected().await, BackendId::Pinned);
        assert_eq!(reopened.active_url().await, "http://pinned");
    }

    #[tokio::test]
    async fn test_corrupt_selection_degrades_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        let path = registry.store.path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"backend":"nightly"}"#).unwrap();
        assert_eq!(registry.selected().await, BackendId::Latest);
    }

    #[tokio::test]
    async fn test_list_options_independent_of_selection() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(dir.path());
        let before = registry.list_options();
        registry.select(BackendId::Pinned).await.unwrap();
        let after = registry.list_options();

        assert_eq!(before, after);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].label, "Latest");
        assert_eq!(after[1].url, "http://pinned");
    }
}
