//! Settlement flow errors.

use thiserror::Error;

use mintflow_core::StoreError;
use mintflow_protocols::{BackendError, WalletError};

/// Claim coordinator errors.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// The session carries no usable auth token.
    #[error("Not authenticated")]
    Unauthenticated,

    /// No balance is claimable right now.
    #[error("Nothing to claim")]
    NothingToClaim,

    /// A previously issued voucher is still open server-side.
    #[error("A claim is already pending; cancel it or wait for its deadline")]
    AlreadyPending,

    /// Another claim for the same user is in flight in this process.
    #[error("A claim is already running")]
    Busy,

    /// The backend refused the claim for a business reason.
    #[error("Claim refused ({code}): {message}")]
    Refused { code: String, message: String },

    /// The wallet declined or failed to submit the transaction.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// The wallet reported success but produced no transaction ID.
    #[error("Wallet returned no transaction ID")]
    MissingTxId,

    /// The backend rejected the claimed transaction outright.
    #[error("Claim confirmation rejected: {0}")]
    ConfirmRejected(String),

    /// Cancelled by the caller.
    #[error("Claim cancelled")]
    Cancelled,

    /// Backend transport or API failure.
    #[error(transparent)]
    Backend(BackendError),

    /// Local state store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClaimError {
    /// Map a backend error into claim semantics. Conflict codes carry
    /// the business outcome.
    pub fn from_backend(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { code, message } => match code.as_str() {
                "nothing_to_claim" => ClaimError::NothingToClaim,
                "claim_pending" => ClaimError::AlreadyPending,
                _ => ClaimError::Refused { code, message },
            },
            other => ClaimError::Backend(other),
        }
    }
}

/// Purchase flow errors.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The session carries no usable auth token.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Requested credit amount was zero.
    #[error("Credit amount must be greater than zero")]
    InvalidAmount,

    /// Another purchase for the same user is in flight in this process.
    #[error("A purchase is already running")]
    Busy,

    /// The wallet declined or failed to submit the payment.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// The wallet reported success but produced no transaction ID.
    #[error("Wallet returned no transaction ID")]
    MissingTxId,

    /// The backend rejected the payment transaction outright.
    #[error("Purchase confirmation rejected: {0}")]
    ConfirmRejected(String),

    /// Cancelled by the caller before the payment was sent.
    #[error("Purchase cancelled")]
    Cancelled,

    /// Backend transport or API failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Local state store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
