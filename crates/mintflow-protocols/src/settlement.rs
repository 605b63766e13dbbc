//! Settlement domain types: vouchers, purchase references, confirm states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend-issued, single-use claim authorization.
///
/// A nonce identifies at most one successful settlement for its
/// lifetime. The backend locks the nonce on issuance and releases it on
/// explicit cancellation or when `deadline` elapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Wallet address receiving the claimed tokens.
    pub recipient: String,
    /// Token amount, smallest unit.
    pub amount: u64,
    /// Unique value binding this voucher to at most one settlement.
    pub nonce: String,
    /// Issuance expiry; the nonce lock lapses after this instant.
    pub deadline: DateTime<Utc>,
    /// Backend signature over the voucher fields.
    pub signature: String,
}

/// Result of a successful voucher request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimGrant {
    /// The issued voucher, including its signature.
    pub voucher: Voucher,
    /// Amount being claimed.
    pub claimed_amount: u64,
}

/// Claim availability as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClaimStatus {
    /// Whether a claim can be started.
    pub can_claim: bool,
    /// Amount currently claimable.
    pub pending_amount: u64,
}

/// Backend view of a settlement confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmState {
    /// Settlement confirmed; credit applied.
    Confirmed,
    /// Not yet observed by the backend; retry.
    Pending,
    /// Nonce unknown. Since a nonce is single-use, this means the
    /// settlement most likely already resolved; treated as success.
    NotFound,
    /// Any other backend value; a hard failure, never retried.
    Unrecognized(String),
}

impl ConfirmState {
    /// Parse the backend's wire string.
    pub fn parse(s: &str) -> ConfirmState {
        match s {
            "confirmed" => ConfirmState::Confirmed,
            "pending" => ConfirmState::Pending,
            "not_found" => ConfirmState::NotFound,
            other => ConfirmState::Unrecognized(other.to_string()),
        }
    }
}

/// One external submission awaiting backend confirmation.
///
/// Created when the signed transaction is handed to the ledger and
/// retired once confirmation resolves or the attempt budget runs out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementAttempt {
    /// Local task tracking this settlement.
    pub task_id: Uuid,
    /// Transaction ID returned by the wallet capability.
    pub external_tx_id: String,
    /// Last observed confirm state (wire string form).
    pub backend_confirm_state: String,
    /// Confirm calls made so far.
    pub attempt_count: u32,
    /// Time of the last confirm call.
    pub last_attempt_at: DateTime<Utc>,
}

/// Backend-issued reference for a credit purchase.
///
/// Consumed by exactly one confirm call. Unlike a voucher nonce, a
/// reference holds no backend-side lock, so there is no cancel call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReference {
    /// Opaque purchase reference.
    pub reference: String,
    /// Price to pay, smallest currency unit.
    pub price: u64,
    /// Credits granted on confirmation.
    pub credit_amount: u64,
}

/// Result of a purchase confirm call.
#[derive(Debug, Clone)]
pub struct PurchaseConfirm {
    /// Confirmation state.
    pub state: ConfirmState,
    /// New credit balance, present when confirmed.
    pub credits: Option<u64>,
}

/// Credit balance after a confirmed purchase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreditBalance {
    /// Total credits on the account.
    pub credits: u64,
}
