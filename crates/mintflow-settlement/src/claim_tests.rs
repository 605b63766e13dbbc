use std::collections::{HashSet, VecDeque};
use std::sync::atomic::AtomicU32;

use chrono::{Duration, Utc};

use mintflow_core::MemoryStateStore;
use mintflow_protocols::{
    BackendError, ClaimGrant, ClaimStatus, PurchaseConfirm, PurchaseReference, SignedSubmission,
    SubmissionStatus, Voucher, WalletError,
};

use super::*;

const NONCE: &str = "n-1";

struct FakeBackend {
    can_claim: bool,
    pending_amount: u64,
    voucher_conflict: Option<(&'static str, &'static str)>,
    /// Popped per confirm call; when empty, `default_confirm` applies.
    confirm_script: Mutex<VecDeque<Result<ConfirmState, BackendError>>>,
    default_confirm: ConfirmState,
    vouchers_issued: AtomicU32,
    cancel_calls: AtomicU32,
    cancelled_nonces: Mutex<Vec<String>>,
    confirm_calls: AtomicU32,
    credited: Mutex<HashSet<(String, String)>>,
    credit_applications: AtomicU32,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            can_claim: true,
            pending_amount: 1500,
            voucher_conflict: None,
            confirm_script: Mutex::new(VecDeque::new()),
            default_confirm: ConfirmState::Pending,
            vouchers_issued: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            cancelled_nonces: Mutex::new(Vec::new()),
            confirm_calls: AtomicU32::new(0),
            credited: Mutex::new(HashSet::new()),
            credit_applications: AtomicU32::new(0),
        }
    }
}

impl FakeBackend {
    fn with_confirms(script: Vec<Result<ConfirmState, BackendError>>) -> Self {
        Self {
            confirm_script: Mutex::new(script.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SettlementBackend for FakeBackend {
    async fn claim_status(&self) -> Result<ClaimStatus, BackendError> {
        Ok(ClaimStatus {
            can_claim: self.can_claim,
            pending_amount: self.pending_amount,
        })
    }

    async fn request_voucher(&self) -> Result<ClaimGrant, BackendError> {
        if let Some((code, message)) = self.voucher_conflict {
            return Err(BackendError::Conflict {
                code: code.to_string(),
                message: message.to_string(),
            });
        }
        self.vouchers_issued.fetch_add(1, Ordering::SeqCst);
        Ok(ClaimGrant {
            voucher: Voucher {
                recipient: "0xabc".into(),
                amount: self.pending_amount,
                nonce: NONCE.into(),
                deadline: Utc::now() + Duration::hours(1),
                signature: "sig".into(),
            },
            claimed_amount: self.pending_amount,
        })
    }

    async fn cancel_voucher(&self, nonce: &str) -> Result<(), BackendError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancelled_nonces.lock().unwrap().push(nonce.to_string());
        Ok(())
    }

    async fn confirm_claim(&self, nonce: &str, tx_id: &str) -> Result<ConfirmState, BackendError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let state = match self.confirm_script.lock().unwrap().pop_front() {
            Some(scripted) => scripted?,
            None => self.default_confirm.clone(),
        };
        if state == ConfirmState::Confirmed {
            let fresh = self
                .credited
                .lock()
                .unwrap()
                .insert((nonce.to_string(), tx_id.to_string()));
            if fresh {
                self.credit_applications.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(state)
    }

    async fn initiate_purchase(
        &self,
        _credit_amount: u64,
    ) -> Result<PurchaseReference, BackendError> {
        unreachable!("not part of the claim flow")
    }

    async fn confirm_purchase(
        &self,
        _reference: &str,
        _tx_id: &str,
    ) -> Result<PurchaseConfirm, BackendError> {
        unreachable!("not part of the claim flow")
    }
}

enum WalletBehavior {
    Accept(&'static str),
    AcceptWithoutTxId,
    Reject,
}

struct FakeWallet {
    behavior: WalletBehavior,
    calls: AtomicU32,
    specs: Mutex<Vec<TransactionSpec>>,
}

impl FakeWallet {
    fn new(behavior: WalletBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
            specs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletCapability for FakeWallet {
    async fn sign_and_send(&self, spec: TransactionSpec) -> Result<SignedSubmission, WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec);
        match self.behavior {
            WalletBehavior::Accept(tx) => Ok(SignedSubmission {
                status: SubmissionStatus::Success,
                tx_id: Some(tx.to_string()),
            }),
            WalletBehavior::AcceptWithoutTxId => Ok(SignedSubmission {
                status: SubmissionStatus::Success,
                tx_id: None,
            }),
            WalletBehavior::Reject => Err(WalletError::Rejected),
        }
    }
}

fn coordinator(
    backend: Arc<FakeBackend>,
    wallet: Arc<FakeWallet>,
) -> (ClaimCoordinator<FakeBackend, FakeWallet>, Arc<MemoryStateStore>) {
    coordinator_with_gate(backend, wallet, FlowGate::new())
}

fn coordinator_with_gate(
    backend: Arc<FakeBackend>,
    wallet: Arc<FakeWallet>,
    gate: FlowGate,
) -> (ClaimCoordinator<FakeBackend, FakeWallet>, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let config = SettlementConfig {
        confirm_attempts: 3,
        confirm_delay_ms: 20,
        purchase_destination: String::new(),
    };
    let coordinator = ClaimCoordinator::new(
        backend,
        wallet,
        store.clone(),
        Session::new("tok", "0xabc"),
        config,
        gate,
    );
    (coordinator, store)
}

#[tokio::test(start_paused = true)]
async fn test_claim_settles_on_confirmed() {
    let backend = Arc::new(FakeBackend::with_confirms(vec![
        Ok(ConfirmState::Pending),
        Ok(ConfirmState::Confirmed),
    ]));
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, store) = coordinator(backend.clone(), wallet.clone());

    let settlement = coordinator.run().await.unwrap();
    assert_eq!(settlement.tx_id, "0xtx");
    assert_eq!(settlement.amount, 1500);
    assert!(settlement.confirmed);
    assert_eq!(coordinator.phase(), ClaimPhase::Settled);

    let task = store.get(settlement.task_id).await.unwrap().unwrap();
    assert_eq!(task.kind, TaskKind::Claim);
    assert_eq!(task.status, TaskStatus::Succeeded);

    let specs = wallet.specs.lock().unwrap();
    match &specs[0] {
        TransactionSpec::VoucherClaim { nonce, signature, amount, .. } => {
            assert_eq!(nonce, NONCE);
            assert_eq!(signature, "sig");
            assert_eq!(*amount, 1500);
        }
        other => panic!("expected a voucher claim, got {:?}", other),
    }
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_nothing_to_claim_issues_no_voucher() {
    let backend = Arc::new(FakeBackend {
        can_claim: false,
        ..FakeBackend::default()
    });
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, store) = coordinator(backend.clone(), wallet.clone());

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::NothingToClaim));
    assert_eq!(backend.vouchers_issued.load(Ordering::SeqCst), 0);
    assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_pending_amount_is_nothing_to_claim() {
    let backend = Arc::new(FakeBackend {
        pending_amount: 0,
        ..FakeBackend::default()
    });
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, _) = coordinator(backend.clone(), wallet);

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::NothingToClaim));
    assert_eq!(backend.vouchers_issued.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_voucher_conflict_maps_to_already_pending() {
    let backend = Arc::new(FakeBackend {
        voucher_conflict: Some(("claim_pending", "a claim is already pending")),
        ..FakeBackend::default()
    });
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, _) = coordinator(backend.clone(), wallet);

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::AlreadyPending));
    // No voucher was issued, so nothing to compensate.
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wallet_rejection_cancels_voucher_exactly_once() {
    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Reject));
    let (coordinator, store) = coordinator(backend.clone(), wallet);

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::Wallet(WalletError::Rejected)));
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.cancelled_nonces.lock().unwrap()[0], NONCE);
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 0);

    let tasks = store.list().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_missing_tx_id_cancels_voucher() {
    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::AcceptWithoutTxId));
    let (coordinator, _) = coordinator(backend.clone(), wallet);

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::MissingTxId));
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_resolves_as_already_settled() {
    let backend = Arc::new(FakeBackend::with_confirms(vec![Ok(ConfirmState::NotFound)]));
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, store) = coordinator(backend.clone(), wallet);

    let settlement = coordinator.run().await.unwrap();
    assert!(settlement.confirmed);
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);

    let task = store.get(settlement.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_pending_exhaustion_reports_unconfirmed_settlement() {
    // Every confirm answers pending; the budget (3) runs out.
    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, store) = coordinator(backend.clone(), wallet);

    let settlement = coordinator.run().await.unwrap();
    assert!(!settlement.confirmed);
    assert_eq!(settlement.tx_id, "0xtx");
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 3);
    // The transaction went out; exhaustion is not a failure and must
    // not release the nonce.
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);

    let task = store.get(settlement.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_confirm_state_fails_without_retry() {
    let backend = Arc::new(FakeBackend::with_confirms(vec![Ok(
        ConfirmState::Unrecognized("reverted".into()),
    )]));
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, store) = coordinator(backend.clone(), wallet);

    let err = coordinator.run().await.unwrap_err();
    match err {
        ClaimError::ConfirmRejected(state) => assert_eq!(state, "reverted"),
        other => panic!("expected ConfirmRejected, got {:?}", other),
    }
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 1);

    let tasks = store.list().await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert!(tasks[0].error.as_deref().unwrap().contains("reverted"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_confirm_errors_are_absorbed() {
    let backend = Arc::new(FakeBackend::with_confirms(vec![
        Err(BackendError::RateLimited),
        Err(BackendError::Network("connection reset".into())),
        Ok(ConfirmState::Confirmed),
    ]));
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, _) = coordinator(backend.clone(), wallet);

    let settlement = coordinator.run().await.unwrap();
    assert!(settlement.confirmed);
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_claim_rejected_while_one_is_active() {
    let gate = FlowGate::new();
    let _held = gate.try_acquire("0xabc", TaskKind::Claim).unwrap();

    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let (coordinator, _) = coordinator_with_gate(backend.clone(), wallet, gate);

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::Busy));
    assert_eq!(backend.vouchers_issued.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_session_is_rejected() {
    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let store = Arc::new(MemoryStateStore::new());
    let coordinator = ClaimCoordinator::new(
        backend.clone(),
        wallet,
        store,
        Session::new("", "0xabc"),
        SettlementConfig::default(),
        FlowGate::new(),
    );

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, ClaimError::Unauthenticated));
    assert_eq!(backend.vouchers_issued.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_confirmation_cancels_voucher() {
    let backend = Arc::new(FakeBackend::default());
    let wallet = Arc::new(FakeWallet::new(WalletBehavior::Accept("0xtx")));
    let store = Arc::new(MemoryStateStore::new());
    let config = SettlementConfig {
        confirm_attempts: 100,
        confirm_delay_ms: 20,
        purchase_destination: String::new(),
    };
    let coordinator = Arc::new(ClaimCoordinator::new(
        backend.clone(),
        wallet,
        store,
        Session::new("tok", "0xabc"),
        config,
        FlowGate::new(),
    ));

    let running = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run().await }
    });
    // Let a few pending confirms happen, then pull the plug.
    tokio::time::sleep(std::time::Duration::from_millis(70)).await;
    coordinator.cancel();

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, ClaimError::Cancelled));
    assert_eq!(coordinator.phase(), ClaimPhase::Cancelled);
    assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.cancelled_nonces.lock().unwrap()[0], NONCE);
}

#[tokio::test]
async fn test_confirm_credits_at_most_once_per_pair() {
    let backend = FakeBackend {
        default_confirm: ConfirmState::Confirmed,
        ..FakeBackend::default()
    };

    assert_eq!(
        backend.confirm_claim(NONCE, "0xtx").await.unwrap(),
        ConfirmState::Confirmed
    );
    assert_eq!(
        backend.confirm_claim(NONCE, "0xtx").await.unwrap(),
        ConfirmState::Confirmed
    );
    assert_eq!(backend.confirm_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.credit_applications.load(Ordering::SeqCst), 1);
}
