//! The supervised backend child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::SupervisorError;
use crate::health::probe_health;

/// Environment variable carrying the port to the backend.
pub const PORT_ENV: &str = "PRISM_BACKEND_PORT";
/// Environment variable carrying the version to the backend.
pub const VERSION_ENV: &str = "PRISM_BACKEND_VERSION";

/// Upper bound on a single readiness probe.
const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to find, launch, and wait for a backend version.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Resource roots searched in order for `backend/<version>/<executable>`
    pub roots: Vec<PathBuf>,
    pub executable: String,
    pub args: Vec<String>,
    pub port: u16,
    pub start_timeout: Duration,
    pub probe_interval: Duration,
}

impl LaunchSpec {
    pub fn from_config(config: &Config) -> Self {
        let s = &config.supervisor;
        Self {
            roots: vec![config.resources_dir(), config.dev_resources_dir()],
            executable: s.executable.clone(),
            args: s.args.clone(),
            port: s.port,
            start_timeout: Duration::from_millis(s.start_timeout_ms),
            probe_interval: Duration::from_millis(s.probe_interval_ms),
        }
    }

    /// Path the executable would have under the first root.
    fn expected_path(&self, version: &str) -> PathBuf {
        let root = self.roots.first().map(PathBuf::as_path).unwrap_or(Path::new("."));
        root.join("backend").join(version).join(&self.executable)
    }

    /// First existing executable for `version`, if any.
    ///
    /// An absolute executable is used as-is for every version.
    pub fn executable_for(&self, version: &str) -> Option<PathBuf> {
        let executable = Path::new(&self.executable);
        if executable.is_absolute() {
            return executable.is_file().then(|| executable.to_path_buf());
        }
        self.roots
            .iter()
            .map(|root| root.join("backend").join(version).join(&self.executable))
            .find(|path| path.is_file())
    }

    /// Arguments with `{port}` and `{version}` substituted.
    pub fn args_for(&self, version: &str) -> Vec<String> {
        let port = self.port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{port}", &port).replace("{version}", version))
            .collect()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// At most one backend child. Replacing it always stops the old one first.
pub struct BackendProcess {
    spec: LaunchSpec,
    http: reqwest::Client,
    child: Option<Child>,
    version: Option<String>,
    state: watch::Sender<ProcessState>,
}

impl BackendProcess {
    pub fn new(spec: LaunchSpec) -> Self {
        let (state, _) = watch::channel(ProcessState::Stopped);
        Self {
            spec,
            http: reqwest::Client::new(),
            child: None,
            version: None,
            state,
        }
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Receiver that observes state changes without locking the process.
    pub fn watch_state(&self) -> watch::Receiver<ProcessState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Version of the live child, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Notice a child that exited on its own and move to `Stopped`.
    pub fn reap(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!(
                    "Backend {} exited ({status})",
                    self.version.as_deref().unwrap_or("?")
                );
                self.child = None;
                self.version = None;
                self.state.send_replace(ProcessState::Stopped);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Failed to poll backend process: {e}"),
        }
    }

    /// Stop any running child, then launch `version` and wait until it is healthy.
    ///
    /// On any failure the new child is killed and the state is `Stopped`.
    pub async fn start(&mut self, version: &str) -> Result<(), SupervisorError> {
        self.stop().await;

        let path = self
            .spec
            .executable_for(version)
            .ok_or_else(|| SupervisorError::ExecutableNotFound(self.spec.expected_path(version)))?;

        self.state.send_replace(ProcessState::Starting);
        tracing::info!("Starting backend {version} from {}", path.display());

        let mut command = Command::new(&path);
        command
            .args(self.spec.args_for(version))
            .env(PORT_ENV, self.spec.port.to_string())
            .env(VERSION_ENV, version)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state.send_replace(ProcessState::Stopped);
                return Err(SupervisorError::Spawn {
                    path,
                    message: e.to_string(),
                });
            }
        };
        tracing::debug!("Backend {version} spawned with pid {:?}", child.id());
        self.child = Some(child);
        self.version = Some(version.to_string());

        match self.wait_ready(version).await {
            Ok(()) => {
                self.state.send_replace(ProcessState::Running);
                tracing::info!("Backend {version} is ready on port {}", self.spec.port);
                Ok(())
            }
            Err(e) => {
                tracing::error!("{e}");
                self.stop().await;
                Err(e)
            }
        }
    }

    async fn wait_ready(&mut self, version: &str) -> Result<(), SupervisorError> {
        let deadline = Instant::now() + self.spec.start_timeout;
        let base_url = self.spec.base_url();

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(SupervisorError::ExitedEarly {
                        version: version.to_string(),
                        status: status.to_string(),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SupervisorError::NotReady {
                    version: version.to_string(),
                    timeout_ms: self.spec.start_timeout.as_millis() as u64,
                });
            }

            let attempt_timeout = remaining.min(MAX_PROBE_TIMEOUT);
            let status = probe_health(&self.http, &base_url, attempt_timeout).await;
            if status.online {
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.spec.probe_interval.min(remaining)).await;
        }
    }

    /// Kill and reap the child, if any. No-op when already stopped.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let version = self.version.take().unwrap_or_default();
            match child.kill().await {
                Ok(()) => tracing::info!("Stopped backend {version}"),
                Err(e) => tracing::debug!("Backend {version} was already gone: {e}"),
            }
        }
        self.version = None;
        self.state.send_replace(ProcessState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(roots: Vec<PathBuf>, executable: &str) -> LaunchSpec {
        LaunchSpec {
            roots,
            executable: executable.to_string(),
            args: vec!["--port".to_string(), "{port}".to_string()],
            port: 8123,
            start_timeout: Duration::from_millis(500),
            probe_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_args_substitute_placeholders() {
        let mut launch = spec(vec![], "prism-backend");
        launch.args.push("--tag=v{version}".to_string());
        assert_eq!(
            launch.args_for("2.0.0"),
            vec!["--port", "8123", "--tag=v2.0.0"]
        );
    }

    #[test]
    fn test_executable_prefers_first_root() {
        let dir = tempfile::tempdir().unwrap();
        let packaged = dir.path().join("packaged");
        let dev = dir.path().join("dev");
        for root in [&packaged, &dev] {
            let version_dir = root.join("backend").join("1.0.0");
            std::fs::create_dir_all(&version_dir).unwrap();
            std::fs::write(version_dir.join("prism-backend"), "").unwrap();
        }
        std::fs::create_dir_all(dev.join("backend").join("2.0.0")).unwrap();
        std::fs::write(dev.join("backend/2.0.0/prism-backend"), "").unwrap();

        let launch = spec(vec![packaged.clone(), dev.clone()], "prism-backend");
        assert_eq!(
            launch.executable_for("1.0.0"),
            Some(packaged.join("backend/1.0.0/prism-backend"))
        );
        assert_eq!(
            launch.executable_for("2.0.0"),
            Some(dev.join("backend/2.0.0/prism-backend"))
        );
        assert_eq!(launch.executable_for("3.0.0"), None);
    }

    #[tokio::test]
    async fn test_missing_executable_stays_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let roots = vec![dir.path().to_path_buf()];
        let mut process = BackendProcess::new(spec(roots, "prism-backend"));

        let err = process.start("1.0.0").await.unwrap_err();
        assert!(matches!(err, SupervisorError::ExecutableNotFound(_)));
        assert_eq!(process.state(), ProcessState::Stopped);
        assert!(process.pid().is_none());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let mut process = BackendProcess::new(spec(vec![], "prism-backend"));
        process.stop().await;
        process.stop().await;
        assert_eq!(process.state(), ProcessState::Stopped);
    }
}
