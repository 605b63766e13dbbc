//! Task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mintflow_protocols::{TaskKind, TaskStatus};

/// A tracked long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: Uuid,
    /// What kind of operation this is.
    pub kind: TaskKind,
    /// Current status.
    pub status: TaskStatus,
    /// Progress 0-100.
    pub progress: u8,
    /// Failure reason, once failed.
    pub error: Option<String>,
    /// Result payload, once succeeded.
    pub result: Option<serde_json::Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task with a fresh id.
    pub fn new(kind: TaskKind) -> Self {
        Self::with_id(Uuid::new_v4(), kind)
    }

    /// Create a new pending task with a backend-assigned id.
    pub fn with_id(id: Uuid, kind: TaskKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the task reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a forward status transition. Returns `false` (and leaves
    /// the task untouched) if the transition would regress.
    pub fn advance(&mut self, status: TaskStatus) -> bool {
        if !self.status.can_transition(status) {
            return false;
        }
        if self.status != status {
            self.status = status;
            self.updated_at = Utc::now();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(TaskKind::Upload);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(!task.is_terminal());
    }

    #[test]
    fn test_advance_forward() {
        let mut task = Task::new(TaskKind::Generation);
        assert!(task.advance(TaskStatus::Running));
        assert!(task.advance(TaskStatus::Succeeded));
        assert!(task.is_terminal());
    }

    #[test]
    fn test_advance_rejects_regression() {
        let mut task = Task::new(TaskKind::Generation);
        assert!(task.advance(TaskStatus::Succeeded));
        assert!(!task.advance(TaskStatus::Running));
        assert!(!task.advance(TaskStatus::Failed));
        assert_eq!(task.status, TaskStatus::Succeeded);
    }
}
