//! Voucher claim coordinator.
//!
//! Drives one claim end to end: check claimability, request a voucher,
//! hand it to the wallet capability, then confirm with the backend
//! through the shared polling monitor. On any failure after issuance but
//! before confirmation the voucher is cancelled so its nonce unlocks
//! immediately instead of at the deadline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mintflow_core::{
    FetchError, PollResolution, PollingMonitor, StateStore, StatusFetcher, Task,
};
use mintflow_protocols::{
    ConfirmState, Session, SettlementBackend, TaskKind, TaskStatus, TaskStatusReport,
    TransactionSpec, WalletCapability,
};

use crate::config::SettlementConfig;
use crate::error::ClaimError;
use crate::gate::FlowGate;

/// Where a running claim currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPhase {
    Idle,
    CheckingStatus,
    RequestingVoucher,
    AwaitingWalletSignature,
    SubmittingToLedger,
    /// Confirmation attempt `n` against the backend.
    ConfirmingWithBackend(u32),
    Settled,
    Cancelled,
    Failed,
}

/// Outcome of a completed claim.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    /// Local task that tracked the claim.
    pub task_id: Uuid,
    /// Ledger transaction ID from the wallet capability.
    pub tx_id: String,
    /// Amount claimed, smallest unit.
    pub amount: u64,
    /// `false` when the confirmation budget ran out while the backend
    /// still reported pending; the transaction was submitted and the
    /// backend will observe it, but this client did not see it land.
    pub confirmed: bool,
}

/// Coordinates a single voucher claim per run.
pub struct ClaimCoordinator<B, W> {
    backend: Arc<B>,
    wallet: Arc<W>,
    store: Arc<dyn StateStore>,
    session: Session,
    config: SettlementConfig,
    gate: FlowGate,
    phase_tx: watch::Sender<ClaimPhase>,
    cancel: CancellationToken,
}

impl<B, W> ClaimCoordinator<B, W>
where
    B: SettlementBackend + 'static,
    W: WalletCapability,
{
    pub fn new(
        backend: Arc<B>,
        wallet: Arc<W>,
        store: Arc<dyn StateStore>,
        session: Session,
        config: SettlementConfig,
        gate: FlowGate,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ClaimPhase::Idle);
        Self {
            backend,
            wallet,
            store,
            session,
            config,
            gate,
            phase_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ClaimPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<ClaimPhase> {
        self.phase_tx.subscribe()
    }

    /// Request cancellation. Takes effect before the wallet submission
    /// or between confirmation attempts; a voucher already issued is
    /// cancelled on the way out.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_phase(&self, phase: ClaimPhase) {
        self.phase_tx.send_replace(phase);
    }

    /// Run the claim to completion.
    pub async fn run(&self) -> Result<Settlement, ClaimError> {
        if !self.session.is_authenticated() {
            return Err(ClaimError::Unauthenticated);
        }
        let _permit = self
            .gate
            .try_acquire(&self.session.wallet_address, TaskKind::Claim)
            .ok_or(ClaimError::Busy)?;

        let result = self.execute().await;
        match &result {
            Ok(_) => self.set_phase(ClaimPhase::Settled),
            Err(ClaimError::Cancelled) => self.set_phase(ClaimPhase::Cancelled),
            Err(_) => self.set_phase(ClaimPhase::Failed),
        }
        result
    }

    async fn execute(&self) -> Result<Settlement, ClaimError> {
        self.set_phase(ClaimPhase::CheckingStatus);
        let status = self
            .backend
            .claim_status()
            .await
            .map_err(ClaimError::from_backend)?;
        if !status.can_claim || status.pending_amount == 0 {
            return Err(ClaimError::NothingToClaim);
        }

        let task = Task::new(TaskKind::Claim);
        let task_id = task.id;
        self.store.insert(task).await?;

        let result = self.settle(task_id).await;
        if let Err(err) = &result {
            let _ = self.store.set_error(task_id, err.to_string()).await;
            let _ = self.store.update_status(task_id, TaskStatus::Failed).await;
        }
        result
    }

    async fn settle(&self, task_id: Uuid) -> Result<Settlement, ClaimError> {
        self.set_phase(ClaimPhase::RequestingVoucher);
        let grant = self
            .backend
            .request_voucher()
            .await
            .map_err(ClaimError::from_backend)?;
        let voucher = grant.voucher;
        info!(
            "Voucher {} issued for {} tokens to {}",
            voucher.nonce, grant.claimed_amount, voucher.recipient
        );
        let _ = self.store.update_status(task_id, TaskStatus::Running).await;

        self.set_phase(ClaimPhase::AwaitingWalletSignature);
        let spec = TransactionSpec::VoucherClaim {
            recipient: voucher.recipient.clone(),
            amount: voucher.amount,
            nonce: voucher.nonce.clone(),
            deadline: voucher.deadline,
            signature: voucher.signature.clone(),
        };

        let submission = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.compensate(&voucher.nonce).await;
                return Err(ClaimError::Cancelled);
            }
            result = self.wallet.sign_and_send(spec) => result,
        };

        let tx_id = match submission {
            Ok(signed) => match signed.usable_tx_id() {
                Some(tx) => tx.to_string(),
                None => {
                    warn!(
                        "Wallet reported success for voucher {} without a transaction ID",
                        voucher.nonce
                    );
                    self.compensate(&voucher.nonce).await;
                    return Err(ClaimError::MissingTxId);
                }
            },
            Err(err) => {
                self.compensate(&voucher.nonce).await;
                return Err(ClaimError::Wallet(err));
            }
        };
        self.set_phase(ClaimPhase::SubmittingToLedger);
        debug!("Voucher {} submitted as transaction {}", voucher.nonce, tx_id);

        let fetcher = Arc::new(ConfirmClaimFetcher {
            backend: Arc::clone(&self.backend),
            nonce: voucher.nonce.clone(),
            tx_id: tx_id.clone(),
            last: Mutex::new(None),
            attempts: AtomicU32::new(0),
            phase: self.phase_tx.clone(),
        });
        let monitor = PollingMonitor::new(self.config.confirm_poll());
        let handle = monitor.start_with_token(
            task_id,
            fetcher.clone(),
            Arc::clone(&self.store),
            self.cancel.child_token(),
        );

        match handle.wait().await {
            PollResolution::Succeeded => {
                if !matches!(fetcher.last_state(), Some(ConfirmState::Confirmed)) {
                    // Nonce unknown to the backend: single-use, so the
                    // settlement most likely already resolved.
                    info!(
                        "Nonce {} not found during confirmation; treating the claim as settled",
                        voucher.nonce
                    );
                }
                Ok(Settlement {
                    task_id,
                    tx_id,
                    amount: grant.claimed_amount,
                    confirmed: true,
                })
            }
            PollResolution::Failed => match fetcher.last_state() {
                Some(ConfirmState::Unrecognized(state)) => Err(ClaimError::ConfirmRejected(state)),
                _ => {
                    let reason = match self.store.get(task_id).await {
                        Ok(Some(task)) => {
                            task.error.unwrap_or_else(|| "confirmation failed".to_string())
                        }
                        _ => "confirmation failed".to_string(),
                    };
                    Err(ClaimError::ConfirmRejected(reason))
                }
            },
            PollResolution::TimedOut => {
                warn!(
                    "Confirmation budget exhausted for nonce {} while still pending; \
                     reporting an unconfirmed settlement",
                    voucher.nonce
                );
                let _ = self.store.update_status(task_id, TaskStatus::Succeeded).await;
                Ok(Settlement {
                    task_id,
                    tx_id,
                    amount: grant.claimed_amount,
                    confirmed: false,
                })
            }
            PollResolution::Cancelled => {
                self.compensate(&voucher.nonce).await;
                Err(ClaimError::Cancelled)
            }
        }
    }

    /// Release the nonce lock after a failed or abandoned submission.
    /// Best effort: on error the nonce stays locked until its deadline.
    async fn compensate(&self, nonce: &str) {
        info!("Cancelling voucher nonce {}", nonce);
        if let Err(err) = self.backend.cancel_voucher(nonce).await {
            warn!(
                "Failed to cancel voucher nonce {}: {}; the nonce stays locked until its deadline",
                nonce, err
            );
        }
    }
}

/// Confirmation adapter for the polling monitor. Maps backend confirm
/// states onto task statuses so the generic loop drives the retries.
struct ConfirmClaimFetcher<B> {
    backend: Arc<B>,
    nonce: String,
    tx_id: String,
    last: Mutex<Option<ConfirmState>>,
    attempts: AtomicU32,
    phase: watch::Sender<ClaimPhase>,
}

impl<B> ConfirmClaimFetcher<B> {
    fn last_state(&self) -> Option<ConfirmState> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl<B: SettlementBackend> StatusFetcher for ConfirmClaimFetcher<B> {
    async fn fetch(&self, _id: Uuid) -> Result<TaskStatusReport, FetchError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.phase
            .send_replace(ClaimPhase::ConfirmingWithBackend(attempt));

        let state = self.backend.confirm_claim(&self.nonce, &self.tx_id).await?;
        if let Ok(mut guard) = self.last.lock() {
            *guard = Some(state.clone());
        }

        let report = match state {
            ConfirmState::Confirmed => TaskStatusReport {
                status: TaskStatus::Succeeded,
                progress: 100,
                result: Some(serde_json::json!({ "tx_id": self.tx_id })),
                error: None,
            },
            // Single-use nonce unknown to the backend: already settled.
            ConfirmState::NotFound => TaskStatusReport {
                status: TaskStatus::Succeeded,
                progress: 100,
                result: None,
                error: None,
            },
            ConfirmState::Pending => TaskStatusReport {
                status: TaskStatus::Running,
                progress: 0,
                result: None,
                error: None,
            },
            ConfirmState::Unrecognized(ref value) => TaskStatusReport {
                status: TaskStatus::Failed,
                progress: 0,
                result: None,
                error: Some(format!("unrecognized confirm state: {}", value)),
            },
        };
        Ok(report)
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
