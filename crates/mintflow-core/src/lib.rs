//! # Mintflow Core
//!
//! Task lifecycle core for the Mintflow client.
//!
//! ## Features
//!
//! - Task records with forward-only status transitions
//! - Client-local state store consumed by presentation layers
//! - Bounded-retry polling monitor with soft timeout and cancellation
//! - Task submission with per-kind payload validation
//! - Two-phase optimistic update (apply / confirm / rollback)

pub mod config;
pub mod error;
pub mod monitor;
pub mod store;
pub mod submit;
pub mod task;
pub mod twophase;

pub use config::PollConfig;
pub use error::{StoreError, SubmitError};
pub use monitor::{
    BackendFetcher, FetchError, MonitorHandle, PollResolution, PollingMonitor, StatusFetcher,
};
pub use store::{MemoryStateStore, StateStore};
pub use submit::{SubmitLimits, TaskSubmitter};
pub use task::Task;
pub use twophase::Optimistic;

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;
