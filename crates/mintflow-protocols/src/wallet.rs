//! Wallet-signing capability trait and transaction types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// A transaction for the wallet capability to sign and submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionSpec {
    /// Claim settlement backed by a voucher.
    VoucherClaim {
        recipient: String,
        amount: u64,
        nonce: String,
        deadline: DateTime<Utc>,
        signature: String,
    },
    /// Credit purchase payment.
    CreditPurchase {
        reference: String,
        price: u64,
        destination: String,
    },
}

/// Wallet-level submission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Error,
}

/// What the wallet capability reports back.
///
/// `status == Success` with a missing or empty `tx_id` is a real case
/// (the capability submitted but lost the id); coordinators treat it as
/// a submission failure and compensate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedSubmission {
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

impl SignedSubmission {
    /// The transaction id, if the submission succeeded with a usable id.
    pub fn usable_tx_id(&self) -> Option<&str> {
        if self.status != SubmissionStatus::Success {
            return None;
        }
        self.tx_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Opaque external signing capability.
///
/// May reject, time out, or succeed without a usable transaction id; all
/// three are first-class cases for callers.
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Sign `spec` and submit it to the external ledger.
    async fn sign_and_send(&self, spec: TransactionSpec) -> Result<SignedSubmission, WalletError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_tx_id() {
        let ok = SignedSubmission {
            status: SubmissionStatus::Success,
            tx_id: Some("0xdeadbeef".into()),
        };
        assert_eq!(ok.usable_tx_id(), Some("0xdeadbeef"));

        let missing = SignedSubmission {
            status: SubmissionStatus::Success,
            tx_id: None,
        };
        assert_eq!(missing.usable_tx_id(), None);

        let blank = SignedSubmission {
            status: SubmissionStatus::Success,
            tx_id: Some("  ".into()),
        };
        assert_eq!(blank.usable_tx_id(), None);

        let errored = SignedSubmission {
            status: SubmissionStatus::Error,
            tx_id: Some("0xdeadbeef".into()),
        };
        assert_eq!(errored.usable_tx_id(), None);
    }
}
