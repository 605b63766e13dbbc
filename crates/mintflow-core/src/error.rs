//! Core errors.

use thiserror::Error;
use uuid::Uuid;

use mintflow_protocols::{BackendError, TaskStatus};

/// State store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No task with this id.
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    /// Rejected backward status transition.
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// Task submission errors.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Payload failed per-kind validation; the user must correct input.
    #[error("Invalid payload: {0}")]
    Validation(String),

    /// No valid session; re-authenticate before retrying.
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Backend unreachable.
    #[error("Backend unreachable: {0}")]
    Network(String),

    /// Any other backend failure.
    #[error(transparent)]
    Backend(BackendError),

    /// Local store rejected the new task record.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BackendError> for SubmitError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Auth(msg) => SubmitError::Auth(msg),
            BackendError::Network(msg) => SubmitError::Network(msg),
            BackendError::Validation(msg) => SubmitError::Validation(msg),
            other => SubmitError::Backend(other),
        }
    }
}
