//! Scheduled health polling.
//!
//! The poller runs one check immediately, then on a fixed cadence, and
//! refreshes the backend version on a slower cadence. Callers can request an
//! out-of-band check (e.g. right after a failed transform) without waiting for
//! the next tick. Each probe is bounded by its own timeout inside the
//! [`HealthCheck`] implementation, so a slow backend never stalls the cadence
//! by more than one probe.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::HealthCheck;
use crate::config::Config;
use crate::types::HealthStatus;

/// Latest known connectivity, as published by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: HealthStatus,
    /// False until the first check has completed
    pub checked: bool,
    /// Backend version, once fetched
    pub version: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: HealthStatus::offline(""),
            checked: false,
            version: None,
        }
    }
}

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub version_interval: Duration,
}

impl PollOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(config.health.poll_interval_ms),
            version_interval: Duration::from_millis(config.health.version_interval_ms),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            version_interval: Duration::from_secs(30),
        }
    }
}

pub struct HealthPoller;

impl HealthPoller {
    /// Start polling on the current tokio runtime.
    pub fn spawn(check: Arc<dyn HealthCheck>, options: PollOptions) -> HealthPollerHandle {
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let trigger = Arc::new(Notify::new());

        tracing::debug!(
            "Starting health polling every {:?} (version every {:?})",
            options.interval,
            options.version_interval
        );
        let task = tokio::spawn(run(check, options, state_tx, trigger.clone()));

        HealthPollerHandle {
            state: state_rx,
            trigger,
            task,
        }
    }
}

/// Control handle for a running poller. Dropping it stops polling.
pub struct HealthPollerHandle {
    state: watch::Receiver<ConnectionState>,
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HealthPollerHandle {
    /// Request an immediate check, independent of the timer phase.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Snapshot of the latest state.
    pub fn latest(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state update.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Cancel polling, including any probe in flight. Safe to call twice.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            tracing::debug!("Stopping health polling");
        }
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for HealthPollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    check: Arc<dyn HealthCheck>,
    options: PollOptions,
    state: watch::Sender<ConnectionState>,
    trigger: Arc<Notify>,
) {
    let mut health_tick = tokio::time::interval(options.interval);
    health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut version_tick = tokio::time::interval(options.version_interval);
    version_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = health_tick.tick() => refresh_health(check.as_ref(), &state).await,
            _ = trigger.notified() => {
                tracing::debug!("Running triggered health check");
                refresh_health(check.as_ref(), &state).await;
            }
            _ = version_tick.tick() => {
                let version = check.backend_version().await;
                state.send_modify(|s| s.version = Some(version));
            }
        }
    }
}

async fn refresh_health(check: &dyn HealthCheck, state: &watch::Sender<ConnectionState>) {
    let status = check.check_health().await;
    let previous = state.borrow().clone();

    if !previous.checked || previous.status.online != status.online {
        if status.online {
            tracing::info!("Backend is online");
        } else {
            tracing::warn!("Backend is offline: {}", status.message);
        }
    }

    state.send_modify(|s| {
        s.status = status;
        s.checked = true;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts probes and answers with a fixed status.
    struct MockCheck {
        online: bool,
        health_calls: Arc<AtomicU32>,
        version_calls: Arc<AtomicU32>,
    }

    impl MockCheck {
        fn new(online: bool) -> Self {
            Self {
                online,
                health_calls: Arc::new(AtomicU32::new(0)),
                version_calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl HealthCheck for MockCheck {
        async fn check_health(&self) -> HealthStatus {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            if self.online {
                HealthStatus::online()
            } else {
                HealthStatus::offline("Backend is not reachable at http://mock")
            }
        }

        async fn backend_version(&self) -> String {
            self.version_calls.fetch_add(1, Ordering::SeqCst);
            "3.0.1".to_string()
        }
    }

    fn slow_options() -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(3600),
            version_interval: Duration::from_secs(3600),
        }
    }

    async fn wait_for_checks(counter: &AtomicU32, expected: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller did not reach expected check count");
    }

    #[tokio::test]
    async fn test_checks_immediately_on_start() {
        let check = MockCheck::new(true);
        let calls = check.health_calls.clone();
        let handle = HealthPoller::spawn(Arc::new(check), slow_options());

        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.checked))
            .await
            .unwrap()
            .unwrap();

        let state = handle.latest();
        assert!(state.status.online);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_version_fetched_on_start() {
        let check = MockCheck::new(false);
        let handle = HealthPoller::spawn(Arc::new(check), slow_options());

        let mut rx = handle.subscribe();
        let versioned = rx.wait_for(|s| s.version.is_some());
        let state = tokio::time::timeout(Duration::from_secs(5), versioned)
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(state.version.as_deref(), Some("3.0.1"));
    }

    #[tokio::test]
    async fn test_polls_on_interval() {
        let check = MockCheck::new(true);
        let calls = check.health_calls.clone();
        let _handle = HealthPoller::spawn(
            Arc::new(check),
            PollOptions {
                interval: Duration::from_millis(20),
                version_interval: Duration::from_secs(3600),
            },
        );

        wait_for_checks(&calls, 3).await;
    }

    #[tokio::test]
    async fn test_trigger_runs_out_of_band_check() {
        let check = MockCheck::new(false);
        let calls = check.health_calls.clone();
        let handle = HealthPoller::spawn(Arc::new(check), slow_options());

        wait_for_checks(&calls, 1).await;
        handle.trigger();
        wait_for_checks(&calls, 2).await;
        assert!(!handle.latest().status.online);
    }

    #[tokio::test]
    async fn test_stop_cancels_polling() {
        let check = MockCheck::new(true);
        let calls = check.health_calls.clone();
        let handle = HealthPoller::spawn(
            Arc::new(check),
            PollOptions {
                interval: Duration::from_millis(10),
                version_interval: Duration::from_secs(3600),
            },
        );

        wait_for_checks(&calls, 1).await;
        handle.stop();
        handle.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_stopped());

        let after_stop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }
}
