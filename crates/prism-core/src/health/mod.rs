//! Backend liveness and version probes.
//!
//! Both probes carry their own deadline and never fail: every outcome is
//! folded into a [`HealthStatus`] or the `"unknown"` version string.

mod poller;

pub use poller::{ConnectionState, HealthPoller, HealthPollerHandle, PollOptions};

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::registry::BackendRegistry;
use crate::types::HealthStatus;

/// Returned by [`HealthCheck::backend_version`] when the version can't be read.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Anything that can report backend liveness and version.
///
/// Uses `async_trait` so the poller can hold an `Arc<dyn HealthCheck>`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_health(&self) -> HealthStatus;

    async fn backend_version(&self) -> String;
}

/// GET `{base_url}/health` under `timeout`.
pub async fn probe_health(
    http: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> HealthStatus {
    let url = format!("{base_url}/health");
    match tokio::time::timeout(timeout, http.get(&url).send()).await {
        Ok(Ok(resp)) if resp.status().is_success() => HealthStatus::online(),
        Ok(Ok(resp)) => HealthStatus::offline(format!(
            "Backend returned status {}",
            resp.status().as_u16()
        )),
        Ok(Err(e)) if e.is_timeout() => HealthStatus::offline("Backend health check timed out"),
        Ok(Err(e)) => {
            tracing::debug!("Health probe to {url} failed: {e}");
            HealthStatus::offline(format!("Backend is not reachable at {base_url}"))
        }
        Err(_) => HealthStatus::offline("Backend health check timed out"),
    }
}

#[derive(Deserialize)]
struct VersionBody {
    #[serde(default)]
    version: Option<String>,
}

/// Probes the currently selected backend.
pub struct HealthMonitor {
    http: reqwest::Client,
    registry: Arc<BackendRegistry>,
    health_timeout: Duration,
    version_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<BackendRegistry>,
        health_timeout: Duration,
        version_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
            health_timeout,
            version_timeout,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<BackendRegistry>) -> Self {
        Self::new(
            registry,
            Duration::from_millis(config.timeouts.health_ms),
            Duration::from_millis(config.timeouts.version_ms),
        )
    }

    async fn fetch_version(&self, base_url: &str) -> Result<Option<String>, reqwest::Error> {
        let resp = self.http.get(format!("{base_url}/version")).send().await?;
        if !resp.status().is_success() {
            tracing::debug!("Version endpoint returned {}", resp.status());
            return Ok(None);
        }
        Ok(resp.json::<VersionBody>().await?.version)
    }
}

#[async_trait]
impl HealthCheck for HealthMonitor {
    async fn check_health(&self) -> HealthStatus {
        let base_url = self.registry.active_url().await;
        tracing::debug!("Checking backend health at {base_url}");
        probe_health(&self.http, &base_url, self.health_timeout).await
    }

    async fn backend_version(&self) -> String {
        let base_url = self.registry.active_url().await;
        match tokio::time::timeout(self.version_timeout, self.fetch_version(&base_url)).await {
            Ok(Ok(Some(version))) if !version.is_empty() => version,
            Ok(Ok(_)) => UNKNOWN_VERSION.to_string(),
            Ok(Err(e)) => {
                tracing::debug!("Failed to get backend version: {e}");
                UNKNOWN_VERSION.to_string()
            }
            Err(_) => {
                tracing::debug!("Backend version request timed out");
                UNKNOWN_VERSION.to_string()
            }
        }
    }
}
