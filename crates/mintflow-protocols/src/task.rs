//! Task kinds, statuses, and status reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of long-running operation a task tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Media upload.
    Upload,
    /// AI content generation.
    Generation,
    /// Token claim settlement.
    Claim,
    /// Credit purchase settlement.
    Purchase,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Upload => "upload",
            TaskKind::Generation => "generation",
            TaskKind::Claim => "claim",
            TaskKind::Purchase => "purchase",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(TaskKind::Upload),
            "generation" => Ok(TaskKind::Generation),
            "claim" => Ok(TaskKind::Claim),
            "purchase" => Ok(TaskKind::Purchase),
            other => Err(format!("unknown task kind: {}", other)),
        }
    }
}

/// Task status. Transitions only move forward; `Succeeded` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    Pending,
    /// In progress server-side.
    Running,
    /// Completed successfully.
    Succeeded,
    /// Failed definitively.
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl TaskStatus {
    /// Whether no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Position in the forward-only ordering. Terminal states share the
    /// highest rank; a transition is legal only if the rank does not
    /// decrease and the current status is not terminal.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Succeeded | TaskStatus::Failed => 2,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    /// Same-status updates are allowed (idempotent no-op).
    pub fn can_transition(&self, next: TaskStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Handle returned when a task is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Task ID assigned by the backend.
    pub id: Uuid,
}

/// Payload for a submittable task kind.
///
/// Claim and purchase tasks are created by their coordinators, not
/// through submission, so they carry no payload here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Media upload descriptor.
    Upload {
        file_name: String,
        size_bytes: u64,
        content_type: String,
    },
    /// AI generation request.
    Generation {
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
}

impl TaskPayload {
    /// The task kind this payload belongs to.
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Upload { .. } => TaskKind::Upload,
            TaskPayload::Generation { .. } => TaskKind::Generation,
        }
    }
}

/// A single observation of a task's server-side state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusReport {
    /// Current status.
    pub status: TaskStatus,
    /// Progress 0-100.
    #[serde(default)]
    pub progress: u8,
    /// Result payload, present once succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure reason, present once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
