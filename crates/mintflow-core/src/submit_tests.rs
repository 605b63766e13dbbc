use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use mintflow_protocols::{BackendError, TaskKind, TaskStatus, TaskStatusReport};

use crate::store::MemoryStateStore;

struct FakeJobBackend {
    submissions: AtomicU32,
    fail_with: Option<fn() -> BackendError>,
}

impl FakeJobBackend {
    fn accepting() -> Self {
        Self {
            submissions: AtomicU32::new(0),
            fail_with: None,
        }
    }

    fn failing(err: fn() -> BackendError) -> Self {
        Self {
            submissions: AtomicU32::new(0),
            fail_with: Some(err),
        }
    }
}

#[async_trait]
impl JobBackend for FakeJobBackend {
    async fn submit_task(
        &self,
        _kind: TaskKind,
        _payload: &TaskPayload,
    ) -> Result<Uuid, BackendError> {
        if let Some(err) = self.fail_with {
            return Err(err());
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(Uuid::new_v4())
    }

    async fn task_status(&self, _id: Uuid) -> Result<TaskStatusReport, BackendError> {
        Ok(TaskStatusReport {
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
        })
    }
}

fn submitter(backend: FakeJobBackend) -> (TaskSubmitter<FakeJobBackend>, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let submitter = TaskSubmitter::new(
        Arc::new(backend),
        store.clone(),
        Session::new("token", "0xabc"),
        SubmitLimits::default(),
    );
    (submitter, store)
}

fn upload(size_bytes: u64) -> TaskPayload {
    TaskPayload::Upload {
        file_name: "clip.mp4".into(),
        size_bytes,
        content_type: "video/mp4".into(),
    }
}

#[tokio::test]
async fn test_submit_creates_pending_task() {
    let (submitter, store) = submitter(FakeJobBackend::accepting());

    let handle = submitter.submit(upload(1024)).await.unwrap();

    let task = store.get(handle.id).await.unwrap().unwrap();
    assert_eq!(task.kind, TaskKind::Upload);
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let (submitter, store) = submitter(FakeJobBackend::accepting());

    let err = submitter
        .submit(upload(200 * 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_upload_rejected() {
    let (submitter, _) = submitter(FakeJobBackend::accepting());
    let err = submitter.submit(upload(0)).await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
}

#[tokio::test]
async fn test_blank_prompt_rejected() {
    let (submitter, _) = submitter(FakeJobBackend::accepting());

    let err = submitter
        .submit(TaskPayload::Generation {
            prompt: "   ".into(),
            style: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
}

#[tokio::test]
async fn test_overlong_prompt_rejected() {
    let (submitter, _) = submitter(FakeJobBackend::accepting());

    let err = submitter
        .submit(TaskPayload::Generation {
            prompt: "x".repeat(5000),
            style: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
}

#[tokio::test]
async fn test_missing_session_is_auth_error() {
    let store = Arc::new(MemoryStateStore::new());
    let submitter = TaskSubmitter::new(
        Arc::new(FakeJobBackend::accepting()),
        store,
        Session::new("", "0xabc"),
        SubmitLimits::default(),
    );

    let err = submitter.submit(upload(1024)).await.unwrap_err();
    assert!(matches!(err, SubmitError::Auth(_)));
}

#[tokio::test]
async fn test_backend_network_error_surfaces() {
    let (submitter, store) = submitter(FakeJobBackend::failing(|| {
        BackendError::Network("connection refused".into())
    }));

    let err = submitter.submit(upload(1024)).await.unwrap_err();
    assert!(matches!(err, SubmitError::Network(_)));
    assert!(store.list().await.unwrap().is_empty());
}
