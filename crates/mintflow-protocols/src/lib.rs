//! # Mintflow Protocols
//!
//! Shared domain types and capability traits for the Mintflow client.
//! Contains only interface definitions and plain data - no network or
//! wallet implementations.
//!
//! ## Core Traits
//!
//! - [`SettlementBackend`] - Claim and purchase endpoints of the backend authority
//! - [`JobBackend`] - Long-running job submission and status endpoints
//! - [`WalletCapability`] - Opaque external signing capability

pub mod backend;
pub mod error;
pub mod session;
pub mod settlement;
pub mod task;
pub mod wallet;

pub use backend::{JobBackend, SettlementBackend};
pub use error::{BackendError, WalletError};
pub use session::Session;
pub use settlement::{
    ClaimGrant, ClaimStatus, ConfirmState, CreditBalance, PurchaseConfirm, PurchaseReference,
    SettlementAttempt, Voucher,
};
pub use task::{TaskHandle, TaskKind, TaskPayload, TaskStatus, TaskStatusReport};
pub use wallet::{SignedSubmission, SubmissionStatus, TransactionSpec, WalletCapability};
