//! Task submission with per-kind payload validation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mintflow_protocols::{JobBackend, Session, TaskHandle, TaskPayload};

use crate::error::SubmitError;
use crate::store::StateStore;
use crate::task::Task;

/// Validation ceilings for submittable payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitLimits {
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Maximum generation prompt length in characters.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_prompt_chars() -> usize {
    4000
}

impl Default for SubmitLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Begins long-running operations: validates the payload, registers the
/// task with the backend, and seeds the local state store.
pub struct TaskSubmitter<B> {
    backend: Arc<B>,
    store: Arc<dyn StateStore>,
    session: Session,
    limits: SubmitLimits,
}

impl<B: JobBackend> TaskSubmitter<B> {
    /// Create a submitter.
    pub fn new(
        backend: Arc<B>,
        store: Arc<dyn StateStore>,
        session: Session,
        limits: SubmitLimits,
    ) -> Self {
        Self {
            backend,
            store,
            session,
            limits,
        }
    }

    /// Submit a task. On success the task is tracked in the state store
    /// with status `Pending`.
    pub async fn submit(&self, payload: TaskPayload) -> Result<TaskHandle, SubmitError> {
        if !self.session.is_authenticated() {
            return Err(SubmitError::Auth("no session token".into()));
        }
        self.validate(&payload)?;

        let kind = payload.kind();
        debug!("Submitting {} task", kind);
        let id = self.backend.submit_task(kind, &payload).await?;

        self.store.insert(Task::with_id(id, kind)).await?;
        info!("Submitted {} task {}", kind, id);
        Ok(TaskHandle { id })
    }

    fn validate(&self, payload: &TaskPayload) -> Result<(), SubmitError> {
        match payload {
            TaskPayload::Upload {
                file_name,
                size_bytes,
                ..
            } => {
                if file_name.trim().is_empty() {
                    return Err(SubmitError::Validation("upload has no file name".into()));
                }
                if *size_bytes == 0 {
                    return Err(SubmitError::Validation("upload is empty".into()));
                }
                if *size_bytes > self.limits.max_upload_bytes {
                    return Err(SubmitError::Validation(format!(
                        "upload of {} bytes exceeds the {} byte ceiling",
                        size_bytes, self.limits.max_upload_bytes
                    )));
                }
            }
            TaskPayload::Generation { prompt, .. } => {
                if prompt.trim().is_empty() {
                    return Err(SubmitError::Validation("prompt is empty".into()));
                }
                if prompt.chars().count() > self.limits.max_prompt_chars {
                    return Err(SubmitError::Validation(format!(
                        "prompt exceeds {} characters",
                        self.limits.max_prompt_chars
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
