//! Backend version supervision.
//!
//! Persists which backend version the user wants, reads the manifest of
//! bundled versions, and (in packaged installs) owns the single backend
//! child process. All process operations are serialized through one async
//! mutex, so a version switch always stops the old backend before the new
//! one is launched.

mod manifest;
mod process;
mod store;

pub use manifest::{ManifestLocator, VersionManifest, MANIFEST_RELATIVE_PATH};
pub use process::{BackendProcess, LaunchSpec, ProcessState, PORT_ENV, VERSION_ENV};
pub use store::{VersionStore, DEFAULT_BACKEND_VERSION};

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::error::SupervisorError;

/// Result of [`VersionSupervisor::set_version`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVersionOutcome {
    /// The version was persisted
    pub success: bool,
    /// A backend is now running the new version
    pub backend_started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of [`VersionSupervisor::try_start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StartOutcome {
    fn from_result(result: Result<(), SupervisorError>) -> Self {
        match result {
            Ok(()) => Self {
                started: true,
                message: None,
            },
            Err(e) => Self {
                started: false,
                message: Some(e.to_string()),
            },
        }
    }
}

pub struct VersionSupervisor {
    store: VersionStore,
    manifest: ManifestLocator,
    process: Mutex<BackendProcess>,
    state: watch::Receiver<ProcessState>,
    port: u16,
    packaged: bool,
}

impl VersionSupervisor {
    pub fn new(
        store: VersionStore,
        manifest: ManifestLocator,
        launch: LaunchSpec,
        packaged: bool,
    ) -> Self {
        let port = launch.port;
        let process = BackendProcess::new(launch);
        let state = process.watch_state();
        Self {
            store,
            manifest,
            process: Mutex::new(process),
            state,
            port,
            packaged,
        }
    }

    /// Packaged mode comes from `supervisor.packaged` (or `PRISM_PACKAGED` via
    /// [`Config::load`]).
    pub fn from_config(config: &Config) -> Self {
        let packaged = config.supervisor.packaged;
        Self::new(
            VersionStore::new(config.version_file()),
            ManifestLocator::new(config.resources_dir(), config.dev_resources_dir()),
            LaunchSpec::from_config(config),
            packaged,
        )
    }

    pub fn is_packaged(&self) -> bool {
        self.packaged
    }

    pub fn manifest_path(&self) -> std::path::PathBuf {
        self.manifest.path()
    }

    /// Persisted version, defaulting to `1.0.0`.
    pub async fn stored_version(&self) -> String {
        self.store.load().await
    }

    pub async fn versions_manifest(&self) -> VersionManifest {
        self.manifest.load().await
    }

    /// Persist `version` and, when packaged, restart the backend on it.
    ///
    /// The version is kept even if the restart fails.
    pub async fn set_version(&self, version: &str) -> SetVersionOutcome {
        let manifest = self.manifest.load().await;
        if !manifest.contains(version) {
            tracing::warn!("Backend version {version} is not listed in the manifest");
        }

        if let Err(e) = self.store.save(version).await {
            let err = SupervisorError::Persist(e);
            tracing::error!("{err}");
            return SetVersionOutcome {
                success: false,
                backend_started: false,
                message: Some(err.to_string()),
            };
        }
        tracing::info!("Backend version set to {version}");

        if !self.packaged {
            return SetVersionOutcome {
                success: true,
                backend_started: false,
                message: None,
            };
        }

        let result = self.process.lock().await.start(version).await;
        let started = StartOutcome::from_result(result);
        SetVersionOutcome {
            success: true,
            backend_started: started.started,
            message: started.message,
        }
    }

    /// Start `version` (or the stored version) unless it is already running.
    pub async fn try_start(&self, version: Option<&str>) -> StartOutcome {
        let version = match version {
            Some(v) => v.to_string(),
            None => self.stored_version().await,
        };

        let mut process = self.process.lock().await;
        process.reap();
        if process.state() == ProcessState::Running && process.version() == Some(version.as_str()) {
            tracing::debug!("Backend {version} is already running");
            return StartOutcome {
                started: true,
                message: Some(format!("Backend {version} is already running")),
            };
        }

        StartOutcome::from_result(process.start(&version).await)
    }

    /// Launch the stored version at startup. Only packaged installs supervise.
    pub async fn start_stored(&self) -> Option<StartOutcome> {
        if !self.packaged {
            tracing::debug!("Not packaged; skipping backend launch");
            return None;
        }
        Some(self.try_start(None).await)
    }

    /// Stop the backend if one is running.
    pub async fn stop(&self) {
        self.process.lock().await.stop().await;
    }

    /// Current state, readable while a start is in progress.
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    /// Running version and pid, after noticing an unexpected exit.
    pub async fn running(&self) -> Option<(String, Option<u32>)> {
        let mut process = self.process.lock().await;
        process.reap();
        let version = process.version()?.to_string();
        Some((version, process.pid()))
    }

    /// URL of the supervised backend.
    pub fn backend_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
