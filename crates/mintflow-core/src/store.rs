//! Client-local task state store.
//!
//! A per-task cache of status, progress, and outcome, driven by the
//! polling monitor and coordinators and consumed by presentation code.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use mintflow_protocols::TaskStatus;

use crate::error::StoreError;
use crate::task::Task;

/// Task state store trait.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert a new task record.
    async fn insert(&self, task: Task) -> Result<(), StoreError>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// List all tracked tasks.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Apply a forward status transition. Rejects regressions with
    /// [`StoreError::InvalidTransition`].
    async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<(), StoreError>;

    /// Update progress (clamped to 100).
    async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), StoreError>;

    /// Attach a result payload.
    async fn set_result(&self, id: Uuid, result: serde_json::Value) -> Result<(), StoreError>;

    /// Attach a failure reason.
    async fn set_error(&self, id: Uuid, error: String) -> Result<(), StoreError>;

    /// Drop a task record.
    async fn remove(&self, id: Uuid) -> Result<(), StoreError>;
}

/// In-memory state store.
#[derive(Default)]
pub struct MemoryStateStore {
    tasks: DashMap<Uuid, Task>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_task<F>(&self, id: Uuid, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Task) -> Result<(), StoreError>,
    {
        match self.tasks.get_mut(&id) {
            Some(mut entry) => f(entry.value_mut()),
            None => Err(StoreError::NotFound(id)),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn insert(&self, task: Task) -> Result<(), StoreError> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<(), StoreError> {
        self.with_task(id, |task| {
            let from = task.status;
            if !task.advance(status) {
                return Err(StoreError::InvalidTransition { from, to: status });
            }
            Ok(())
        })
    }

    async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), StoreError> {
        self.with_task(id, |task| {
            task.progress = progress.min(100);
            task.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn set_result(&self, id: Uuid, result: serde_json::Value) -> Result<(), StoreError> {
        self.with_task(id, |task| {
            task.result = Some(result);
            task.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn set_error(&self, id: Uuid, error: String) -> Result<(), StoreError> {
        self.with_task(id, |task| {
            task.error = Some(error);
            task.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        self.tasks.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
