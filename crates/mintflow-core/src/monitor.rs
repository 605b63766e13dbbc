//! Bounded-retry polling monitor.
//!
//! Drives a task from submission to a terminal state by polling a
//! [`StatusFetcher`] on a fixed interval, writing every observation into
//! the [`StateStore`] and emitting statuses to the caller. Shared by the
//! upload, generation, and settlement-confirmation flows.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mintflow_protocols::{BackendError, JobBackend, TaskStatus, TaskStatusReport};

use crate::config::PollConfig;
use crate::store::StateStore;

/// How a polling run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResolution {
    /// Terminal success observed.
    Succeeded,
    /// Terminal failure observed (or a fatal fetch error).
    Failed,
    /// Attempt budget exhausted while the status was still non-terminal.
    /// A soft timeout: the underlying job may still complete server-side.
    TimedOut,
    /// Cancelled by the caller before resolution.
    Cancelled,
}

/// Status fetch errors as seen by the monitor.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Rate-limited response; transient.
    #[error("Rate limited")]
    RateLimited,

    /// Network-level failure; transient.
    #[error("Network error: {0}")]
    Network(String),

    /// Unrecoverable failure; the monitor stops and fails the task.
    #[error("Fatal fetch error: {0}")]
    Fatal(String),
}

impl FetchError {
    /// Transient errors are swallowed by the monitor and never flip a
    /// task to failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Network(_))
    }
}

impl From<BackendError> for FetchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::RateLimited => FetchError::RateLimited,
            BackendError::Network(msg) => FetchError::Network(msg),
            other => FetchError::Fatal(other.to_string()),
        }
    }
}

/// Source of status observations for one task.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetch the current status of `id`.
    async fn fetch(&self, id: Uuid) -> Result<TaskStatusReport, FetchError>;
}

/// Adapter polling a [`JobBackend`]'s task-status endpoint.
pub struct BackendFetcher<B> {
    backend: Arc<B>,
}

impl<B: JobBackend> BackendFetcher<B> {
    /// Wrap a job backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: JobBackend> StatusFetcher for BackendFetcher<B> {
    async fn fetch(&self, id: Uuid) -> Result<TaskStatusReport, FetchError> {
        self.backend.task_status(id).await.map_err(FetchError::from)
    }
}

/// Handle to a running polling loop.
///
/// Dropping the handle does not stop the loop; call [`MonitorHandle::cancel`]
/// or let the loop resolve. Cancellation clears the interval timer on
/// every exit path.
pub struct MonitorHandle {
    task_id: Uuid,
    token: CancellationToken,
    updates: mpsc::Receiver<TaskStatus>,
    join: JoinHandle<PollResolution>,
}

impl MonitorHandle {
    /// The task being polled.
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// The cancellation token driving this loop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation; polling stops within one interval.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Receive the next observed status, or `None` once the loop exits.
    pub async fn recv(&mut self) -> Option<TaskStatus> {
        self.updates.recv().await
    }

    /// Wait for the loop to resolve.
    pub async fn wait(self) -> PollResolution {
        self.join.await.unwrap_or(PollResolution::Cancelled)
    }
}

/// Generic bounded-retry polling loop.
#[derive(Debug, Clone)]
pub struct PollingMonitor {
    config: PollConfig,
}

impl PollingMonitor {
    /// Create a monitor with the given configuration.
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Start polling `task_id` with a fresh cancellation token.
    pub fn start(
        &self,
        task_id: Uuid,
        fetcher: Arc<dyn StatusFetcher>,
        store: Arc<dyn StateStore>,
    ) -> MonitorHandle {
        self.start_with_token(task_id, fetcher, store, CancellationToken::new())
    }

    /// Start polling `task_id`, tied to an externally owned token so a
    /// parent flow can tear the loop down.
    pub fn start_with_token(
        &self,
        task_id: Uuid,
        fetcher: Arc<dyn StatusFetcher>,
        store: Arc<dyn StateStore>,
        token: CancellationToken,
    ) -> MonitorHandle {
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel(32);
        let loop_token = token.clone();

        let join = tokio::spawn(async move {
            run_poll_loop(task_id, config, fetcher, store, tx, loop_token).await
        });

        MonitorHandle {
            task_id,
            token,
            updates: rx,
            join,
        }
    }
}

async fn run_poll_loop(
    task_id: Uuid,
    config: PollConfig,
    fetcher: Arc<dyn StatusFetcher>,
    store: Arc<dyn StateStore>,
    tx: mpsc::Sender<TaskStatus>,
    token: CancellationToken,
) -> PollResolution {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut attempts: u32 = 0;
    let mut last_status: Option<TaskStatus> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Polling for task {} cancelled after {} attempts", task_id, attempts);
                return PollResolution::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        match fetcher.fetch(task_id).await {
            Ok(report) => {
                attempts += 1;
                apply_report(&*store, task_id, &report).await;

                let regressed = last_status
                    .map(|prev| !prev.can_transition(report.status))
                    .unwrap_or(false);
                if regressed {
                    warn!(
                        "Task {} reported backward status {:?} after {:?}; ignoring",
                        task_id, report.status, last_status
                    );
                } else if last_status != Some(report.status) {
                    last_status = Some(report.status);
                    let _ = tx.try_send(report.status);
                }

                match report.status {
                    TaskStatus::Succeeded => {
                        debug!("Task {} succeeded after {} polls", task_id, attempts);
                        return PollResolution::Succeeded;
                    }
                    TaskStatus::Failed => {
                        debug!("Task {} failed after {} polls", task_id, attempts);
                        return PollResolution::Failed;
                    }
                    _ => {}
                }
            }
            Err(err) if err.is_transient() => {
                if config.count_transient {
                    attempts += 1;
                }
                debug!("Transient poll error for task {}: {}", task_id, err);
            }
            Err(err) => {
                warn!("Fatal poll error for task {}: {}", task_id, err);
                let _ = store.set_error(task_id, err.to_string()).await;
                if let Err(e) = store.update_status(task_id, TaskStatus::Failed).await {
                    warn!("Failed to record failure for task {}: {}", task_id, e);
                }
                let _ = tx.try_send(TaskStatus::Failed);
                return PollResolution::Failed;
            }
        }

        if attempts >= config.max_attempts {
            info!(
                "Polling budget ({}) exhausted for task {} while non-terminal; soft timeout",
                config.max_attempts, task_id
            );
            return PollResolution::TimedOut;
        }
    }
}

async fn apply_report(store: &dyn StateStore, task_id: Uuid, report: &TaskStatusReport) {
    if report.progress > 0 {
        let _ = store.set_progress(task_id, report.progress).await;
    }
    if let Some(result) = &report.result {
        let _ = store.set_result(task_id, result.clone()).await;
    }
    if let Some(error) = &report.error {
        let _ = store.set_error(task_id, error.clone()).await;
    }
    if let Err(e) = store.update_status(task_id, report.status).await {
        debug!("Store rejected status update for task {}: {}", task_id, e);
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
