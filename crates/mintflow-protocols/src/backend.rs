//! Backend capability traits.
//!
//! The backend is the sole arbiter of idempotency (nonce uniqueness,
//! reference single-use); clients never assume local deduplication is
//! sufficient, since a user may retry from a second device.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BackendError;
use crate::settlement::{
    ClaimGrant, ClaimStatus, ConfirmState, PurchaseConfirm, PurchaseReference,
};
use crate::task::{TaskKind, TaskPayload, TaskStatusReport};

/// Claim and purchase endpoints of the backend authority.
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    /// `GET /claim/status` - whether anything is claimable right now.
    async fn claim_status(&self) -> Result<ClaimStatus, BackendError>;

    /// `POST /claim/request` - issue a voucher and lock its nonce.
    ///
    /// Business refusals ("nothing to claim", "claim already pending")
    /// surface as [`BackendError::Conflict`] and are never retried.
    async fn request_voucher(&self) -> Result<ClaimGrant, BackendError>;

    /// `POST /claim/cancel` - release the lock on `nonce`.
    ///
    /// The compensating action after a failed wallet submission.
    async fn cancel_voucher(&self, nonce: &str) -> Result<(), BackendError>;

    /// `POST /claim/confirm` - ask whether the settlement for
    /// `(nonce, tx_id)` has been observed. Idempotent: repeated calls
    /// with the same pair credit the account at most once.
    async fn confirm_claim(&self, nonce: &str, tx_id: &str) -> Result<ConfirmState, BackendError>;

    /// `POST /purchase/initiate` - issue a purchase reference.
    async fn initiate_purchase(&self, credit_amount: u64)
        -> Result<PurchaseReference, BackendError>;

    /// `POST /purchase/confirm` - confirm payment for `reference`.
    /// Idempotent for a given `(reference, tx_id)` pair.
    async fn confirm_purchase(
        &self,
        reference: &str,
        tx_id: &str,
    ) -> Result<PurchaseConfirm, BackendError>;
}

/// Long-running job endpoints of the backend authority.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// `POST /task` - begin a long-running operation.
    async fn submit_task(&self, kind: TaskKind, payload: &TaskPayload)
        -> Result<Uuid, BackendError>;

    /// `GET /task/{id}/status` - observe a task's server-side state.
    async fn task_status(&self, id: Uuid) -> Result<TaskStatusReport, BackendError>;
}
