//! Prism Core - client-side orchestration for a remote image-transform backend.
//!
//! Prism validates transformation requests, sends them to whichever backend
//! is selected (latest or pinned), keeps track of backend health, and
//! supervises a locally bundled backend process in packaged installs. The
//! image processing itself happens entirely inside the backend.
//!
//! # Architecture
//!
//! ```text
//! specs ─→ Validator ─→ TransformClient ─→ BackendRegistry (active URL) ─→ POST /transform
//!                              │ failure
//!                              ▼
//!                 HealthPoller (timer + trigger) ─→ GET /health, GET /version
//!
//! VersionSupervisor: versions.json, backend-config.json, backend child process
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, ImageFile, Prism, TransformationSpecs};
//!
//! async fn thumbnail(png: Vec<u8>) -> prism_core::Result<Vec<u8>> {
//!     let prism = Prism::new(Config::load()?);
//!
//!     let file = ImageFile::new("photo.png", "image/png", png);
//!     let result = prism.transform(&file, &TransformationSpecs::resize_only(160, 120)).await?;
//!     Ok(result.decode_image().unwrap_or_default())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod registry;
pub mod supervisor;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use client::TransformClient;
pub use config::Config;
pub use error::{
    ConfigError, PrismError, Result, SupervisorError, TransformError, ValidationError,
};
pub use health::{
    ConnectionState, HealthCheck, HealthMonitor, HealthPoller, HealthPollerHandle, PollOptions,
};
pub use registry::{BackendId, BackendOption, BackendRegistry};
pub use supervisor::{
    ProcessState, SetVersionOutcome, StartOutcome, VersionManifest, VersionSupervisor,
};
pub use types::{
    ColorAdjustment, Crop, CropShape, HealthStatus, ImageFile, Resize, TransformationResult,
    TransformationSpecs,
};
pub use validate::{validate_specs, validate_value, Validator};

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// All Prism components wired from one [`Config`].
pub struct Prism {
    config: Config,
    registry: Arc<BackendRegistry>,
    client: TransformClient,
    health: Arc<HealthMonitor>,
    supervisor: VersionSupervisor,
    poller: Option<HealthPollerHandle>,
}

impl Prism {
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing Prism v{}", VERSION);
        let registry = Arc::new(BackendRegistry::from_config(&config));
        let client = TransformClient::from_config(&config, registry.clone());
        let health = Arc::new(HealthMonitor::from_config(&config, registry.clone()));
        let supervisor = VersionSupervisor::from_config(&config);
        Self {
            config,
            registry,
            client,
            health,
            supervisor,
            poller: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn client(&self) -> &TransformClient {
        &self.client
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn supervisor(&self) -> &VersionSupervisor {
        &self.supervisor
    }

    /// Start background health polling. Replaces any previous poller.
    pub fn start_polling(&mut self) -> &HealthPollerHandle {
        let options = PollOptions::from_config(&self.config);
        let check: Arc<dyn HealthCheck> = self.health.clone();
        self.poller.insert(HealthPoller::spawn(check, options))
    }

    pub fn poller(&self) -> Option<&HealthPollerHandle> {
        self.poller.as_ref()
    }

    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// Run one transform. Any failure, a rejected request included, triggers
    /// an immediate health check on the poller when one is running.
    pub async fn transform(
        &self,
        file: &ImageFile,
        specs: &TransformationSpecs,
    ) -> std::result::Result<TransformationResult, TransformError> {
        let result = self.client.transform(file, specs).await;
        if let (Err(_), Some(poller)) = (&result, &self.poller) {
            poller.trigger();
        }
        result
    }
}
