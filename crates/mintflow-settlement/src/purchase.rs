//! Credit purchase flow.
//!
//! Mirrors the claim machine: initiate for a reference, pay through the
//! wallet capability, confirm with the backend. Unlike a voucher nonce,
//! a purchase reference holds no backend-side lock, so there is no
//! compensating cancel call anywhere in this flow; an abandoned
//! reference simply expires server-side.

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
use crate::error::PurchaseError;
use crate::gate::FlowGate;

/// Where a running purchase currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchasePhase {
    Idle,
    Initiating,
    AwaitingWallet,
    /// Confirmation attempt `n` against the backend.
    ConfirmingWithBackend(u32),
    Completed,
    Cancelled,
    Failed,
}

/// Outcome of a completed purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    /// Local task that tracked the purchase.
    pub task_id: Uuid,
    /// Ledger transaction ID from the wallet capability.
    pub tx_id: String,
    /// New credit balance when the backend reported one.
    pub credits: Option<u64>,
    /// `false` when the confirmation budget ran out while the backend
    /// still reported pending.
    pub confirmed: bool,
}

/// Coordinates a single credit purchase per run.
pub struct PurchaseFlow<B, W> {
    backend: Arc<B>,
    wallet: Arc<W>,
    store: Arc<dyn StateStore>,
    session: Session,
    config: SettlementConfig,
    gate: FlowGate,
    phase_tx: watch::Sender<PurchasePhase>,
    cancel: CancellationToken,
}

impl<B, W> PurchaseFlow<B, W>
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
        let (phase_tx, _) = watch::channel(PurchasePhase::Idle);
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
    pub fn phase(&self) -> PurchasePhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<PurchasePhase> {
        self.phase_tx.subscribe()
    }

    /// Request cancellation. Only effective before the payment is
    /// handed to the wallet; a submitted payment is never abandoned
    /// mid-confirmation without surfacing the transaction ID.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_phase(&self, phase: PurchasePhase) {
        self.phase_tx.send_replace(phase);
    }

    /// Buy `credit_amount` credits.
    pub async fn run(&self, credit_amount: u64) -> Result<PurchaseOutcome, PurchaseError> {
        if !self.session.is_authenticated() {
            return Err(PurchaseError::Unauthenticated);
        }
        if credit_amount == 0 {
            return Err(PurchaseError::InvalidAmount);
        }
        let _permit = self
            .gate
            .try_acquire(&self.session.wallet_address, TaskKind::Purchase)
            .ok_or(PurchaseError::Busy)?;

        let result = self.execute(credit_amount).await;
        match &result {
            Ok(_) => self.set_phase(PurchasePhase::Completed),
            Err(PurchaseError::Cancelled) => self.set_phase(PurchasePhase::Cancelled),
            Err(_) => self.set_phase(PurchasePhase::Failed),
        }
        result
    }

    async fn execute(&self, credit_amount: u64) -> Result<PurchaseOutcome, PurchaseError> {
        let task = Task::new(TaskKind::Purchase);
        let task_id = task.id;
        self.store.insert(task).await?;

        let result = self.pay(task_id, credit_amount).await;
        if let Err(err) = &result {
            let _ = self.store.set_error(task_id, err.to_string()).await;
            let _ = self.store.update_status(task_id, TaskStatus::Failed).await;
        }
        result
    }

    async fn pay(&self, task_id: Uuid, credit_amount: u64) -> Result<PurchaseOutcome, PurchaseError> {
        self.set_phase(PurchasePhase::Initiating);
        let reference = self.backend.initiate_purchase(credit_amount).await?;
        info!(
            "Purchase reference {} issued: {} credits for {}",
            reference.reference, reference.credit_amount, reference.price
        );
        let _ = self.store.update_status(task_id, TaskStatus::Running).await;

        self.set_phase(PurchasePhase::AwaitingWallet);
        let spec = TransactionSpec::CreditPurchase {
            reference: reference.reference.clone(),
            price: reference.price,
            destination: self.config.purchase_destination.clone(),
        };

        let submission = tokio::select! {
            _ = self.cancel.cancelled() => {
                // Nothing to compensate; the reference expires on its own.
                return Err(PurchaseError::Cancelled);
            }
            result = self.wallet.sign_and_send(spec) => result,
        };

        let tx_id = match submission {
            Ok(signed) => match signed.usable_tx_id() {
                Some(tx) => tx.to_string(),
                None => {
                    warn!(
                        "Wallet reported success for reference {} without a transaction ID",
                        reference.reference
                    );
                    return Err(PurchaseError::MissingTxId);
                }
            },
            Err(err) => return Err(PurchaseError::Wallet(err)),
        };
        debug!(
            "Payment for reference {} submitted as transaction {}",
            reference.reference, tx_id
        );

        let fetcher = Arc::new(ConfirmPurchaseFetcher {
            backend: Arc::clone(&self.backend),
            reference: reference.reference.clone(),
            tx_id: tx_id.clone(),
            last: Mutex::new(None),
            credits: Mutex::new(None),
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
            PollResolution::Succeeded => Ok(PurchaseOutcome {
                task_id,
                tx_id,
                credits: fetcher.credits(),
                confirmed: true,
            }),
            PollResolution::Failed => match fetcher.last_state() {
                Some(ConfirmState::Unrecognized(state)) => {
                    Err(PurchaseError::ConfirmRejected(state))
                }
                _ => {
                    let reason = match self.store.get(task_id).await {
                        Ok(Some(task)) => {
                            task.error.unwrap_or_else(|| "confirmation failed".to_string())
                        }
                        _ => "confirmation failed".to_string(),
                    };
                    Err(PurchaseError::ConfirmRejected(reason))
                }
            },
            PollResolution::TimedOut => {
                warn!(
                    "Confirmation budget exhausted for reference {} while still pending; \
                     reporting an unconfirmed purchase",
                    reference.reference
                );
                let _ = self.store.update_status(task_id, TaskStatus::Succeeded).await;
                Ok(PurchaseOutcome {
                    task_id,
                    tx_id,
                    credits: None,
                    confirmed: false,
                })
            }
            PollResolution::Cancelled => Err(PurchaseError::Cancelled),
        }
    }
}

/// Confirmation adapter for the polling monitor.
struct ConfirmPurchaseFetcher<B> {
    backend: Arc<B>,
    reference: String,
    tx_id: String,
    last: Mutex<Option<ConfirmState>>,
    credits: Mutex<Option<u64>>,
    attempts: AtomicU32,
    phase: watch::Sender<PurchasePhase>,
}

impl<B> ConfirmPurchaseFetcher<B> {
    fn last_state(&self) -> Option<ConfirmState> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }

    fn credits(&self) -> Option<u64> {
        self.credits.lock().ok().and_then(|guard| *guard)
    }
}

#[async_trait]
impl<B: SettlementBackend> StatusFetcher for ConfirmPurchaseFetcher<B> {
    async fn fetch(&self, _id: Uuid) -> Result<TaskStatusReport, FetchError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.phase
            .send_replace(PurchasePhase::ConfirmingWithBackend(attempt));

        let confirm = self
            .backend
            .confirm_purchase(&self.reference, &self.tx_id)
            .await?;
        if let Ok(mut guard) = self.last.lock() {
            *guard = Some(confirm.state.clone());
        }
        if let Some(credits) = confirm.credits {
            if let Ok(mut guard) = self.credits.lock() {
                *guard = Some(credits);
            }
        }

        let report = match confirm.state {
            ConfirmState::Confirmed => TaskStatusReport {
                status: TaskStatus::Succeeded,
                progress: 100,
                result: confirm
                    .credits
                    .map(|credits| serde_json::json!({ "credits": credits })),
                error: None,
            },
            // Reference already consumed; the purchase resolved.
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
#[path = "purchase_tests.rs"]
mod tests;
