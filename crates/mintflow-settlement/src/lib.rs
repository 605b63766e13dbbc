//! # Mintflow Settlement
//!
//! Coordinators for the two financial flows:
//!
//! - [`ClaimCoordinator`] - nonce-based token claim: request voucher,
//!   submit through the wallet capability, confirm with the backend,
//!   compensate on failure.
//! - [`PurchaseFlow`] - reference-based credit purchase: initiate, pay,
//!   confirm.
//!
//! Both are specialized task kinds driven by the shared
//! [`PollingMonitor`](mintflow_core::PollingMonitor) and recorded in the
//! [`StateStore`](mintflow_core::StateStore).

pub mod claim;
pub mod config;
pub mod error;
pub mod gate;
pub mod purchase;

pub use claim::{ClaimCoordinator, ClaimPhase, Settlement};
pub use config::SettlementConfig;
pub use error::{ClaimError, PurchaseError};
pub use gate::{FlowGate, FlowPermit};
pub use purchase::{PurchaseFlow, PurchaseOutcome, PurchasePhase};
