//! End-to-end sweep scenarios against the in-memory ledger

use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use solsweep::solana::{MemoryLedger, ScriptedOutcome, ScriptedSigner};
use solsweep::sweep::{
    ContinuationPolicy, FailureContext, Ledger, LedgerResult, NeverContinue, RecentBlockhash,
    SignatureState, SweepOrchestrator, SweepSigner, TokenAccountBalance,
};
use solsweep::types::{RunOutcome, TxStatus, LAMPORTS_PER_SOL};
use solsweep::{FailureKind, SweepSettings};

const RESERVE: u64 = 1_000_000;

struct Scenario {
    ledger: Arc<MemoryLedger>,
    signer: Arc<ScriptedSigner>,
    destination: Pubkey,
}

async fn scenario(tokens: usize, native_lamports: u64, script: Vec<ScriptedOutcome>) -> Scenario {
    let ledger = Arc::new(MemoryLedger::new());
    let signer = Arc::new(ScriptedSigner::new(ledger.clone()).with_script(script));
    let owner = signer.pubkey();

    ledger.set_native_balance(owner, native_lamports).await;
    for i in 0..tokens {
        // Descending value so discovery order is predictable
        let amount = (tokens - i) as u64 * 1_000_000;
        ledger
            .add_token_account(owner, Pubkey::new_unique(), amount, 6)
            .await;
    }

    Scenario {
        ledger,
        signer,
        destination: Pubkey::new_unique(),
    }
}

impl Scenario {
    fn orchestrator(&self) -> SweepOrchestrator {
        self.orchestrator_over(self.ledger.clone())
    }

    fn orchestrator_over(&self, ledger: Arc<dyn Ledger>) -> SweepOrchestrator {
        let mut settings = SweepSettings::new(self.destination);
        settings.native_reserve_lamports = RESERVE;
        settings.inter_batch_delay = Duration::ZERO;
        settings.confirmation.poll_interval = Duration::from_millis(1);
        settings.confirmation.max_wait = Duration::from_millis(500);

        SweepOrchestrator::new(ledger, self.signer.clone(), settings)
    }
}

/// Serves the discovered native balance once, then what is left after fees and rent
struct DrainingLedger {
    inner: Arc<MemoryLedger>,
    remaining: u64,
    native_reads: AtomicUsize,
}

impl DrainingLedger {
    fn new(inner: Arc<MemoryLedger>, remaining: u64) -> Self {
        Self {
            inner,
            remaining,
            native_reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Ledger for DrainingLedger {
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        if self.native_reads.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.native_balance(owner).await
        } else {
            Ok(self.remaining)
        }
    }

    async fn token_balances(&self, owner: &Pubkey) -> LedgerResult<Vec<TokenAccountBalance>> {
        self.inner.token_balances(owner).await
    }

    async fn account_exists(&self, address: &Pubkey) -> LedgerResult<bool> {
        self.inner.account_exists(address).await
    }

    async fn latest_blockhash(&self) -> LedgerResult<RecentBlockhash> {
        self.inner.latest_blockhash().await
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        self.inner.block_height().await
    }

    async fn signature_state(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> LedgerResult<SignatureState> {
        self.inner.signature_state(signature, commitment).await
    }
}

/// Records every failure it is asked about, answering with a fixed decision
struct RecordingPolicy {
    answer: bool,
    asked: AtomicUsize,
    last_kind: std::sync::Mutex<Option<FailureKind>>,
}

impl RecordingPolicy {
    fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
            last_kind: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl ContinuationPolicy for RecordingPolicy {
    async fn should_continue(&self, context: &FailureContext) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        *self.last_kind.lock().unwrap() = Some(context.kind);
        self.answer
    }
}

#[tokio::test]
async fn seven_tokens_and_native_take_three_submissions_in_order() {
    let s = scenario(7, RESERVE + 10_000_000, vec![]).await;

    let report = s.orchestrator().run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.submissions, 3);
    assert_eq!(report.records.len(), 8);
    assert!(report.records.iter().all(|r| r.status == TxStatus::Success));

    let sent = s.signer.received().await;
    assert_eq!(sent.len(), 3);

    // Every destination account is missing, so each transfer carries a creation
    assert_eq!(sent[0].message.instructions.len(), 10);
    assert_eq!(sent[1].message.instructions.len(), 4);

    // Native transfer last: a single system instruction
    let native = &sent[2].message;
    assert_eq!(native.instructions.len(), 1);
    let program = native.account_keys[native.instructions[0].program_id_index as usize];
    assert_eq!(program, system_program::id());
    assert!(native.account_keys.contains(&s.destination));

    // Batch records share one signature
    let first = report.records[0].signature.clone();
    assert!(report.records[..5].iter().all(|r| r.signature == first));
    assert_ne!(report.records[5].signature, first);
    assert_eq!(report.records[7].id, "SOL");
}

#[tokio::test]
async fn empty_account_is_nothing_to_sweep() {
    // Native balance above the reserve but within the dust threshold
    let s = scenario(0, RESERVE + 5_000, vec![]).await;

    let report = s.orchestrator().run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::NothingToSweep);
    assert!(report.records.is_empty());
    assert_eq!(report.submissions, 0);
    assert_eq!(s.signer.submission_count().await, 0);
}

#[tokio::test]
async fn unreachable_ledger_is_degraded_nothing_to_sweep() {
    let s = scenario(3, 10 * LAMPORTS_PER_SOL, vec![]).await;
    s.ledger.fail_reads(true).await;

    let report = s.orchestrator().run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::NothingToSweep);
    assert!(report.discovery_degraded);
    assert_eq!(s.signer.submission_count().await, 0);
}

#[tokio::test]
async fn rejection_cancels_and_leaves_later_steps_pending() {
    let s = scenario(
        7,
        RESERVE + 10_000_000,
        vec![ScriptedOutcome::Confirm, ScriptedOutcome::Reject],
    )
    .await;
    let policy = Arc::new(RecordingPolicy::new(true));

    let report = s
        .orchestrator()
        .with_continuation(policy.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.submissions, 2);
    assert_eq!(policy.asked.load(Ordering::SeqCst), 0);

    assert!(report.records[..5].iter().all(|r| r.status == TxStatus::Success));
    assert!(report.records[5..7].iter().all(|r| r.status == TxStatus::Error));
    assert_eq!(report.records[7].status, TxStatus::Pending);
}

#[tokio::test]
async fn declined_continuation_after_network_failure_stops_before_native() {
    let s = scenario(
        7,
        RESERVE + 10_000_000,
        vec![
            ScriptedOutcome::Confirm,
            ScriptedOutcome::SubmitError("429 Too Many Requests".into()),
        ],
    )
    .await;
    let policy = Arc::new(RecordingPolicy::new(false));

    let report = s
        .orchestrator()
        .with_continuation(policy.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Error);
    assert_eq!(policy.asked.load(Ordering::SeqCst), 1);
    assert_eq!(
        *policy.last_kind.lock().unwrap(),
        Some(FailureKind::NetworkOrRpc)
    );

    assert!(report.records[..5].iter().all(|r| r.status == TxStatus::Success));
    assert!(report.records[5..7].iter().all(|r| r.status == TxStatus::Error));
    assert_eq!(report.records[7].status, TxStatus::Pending);
    // Native transfer never handed to the signer
    assert_eq!(s.signer.submission_count().await, 2);
}

#[tokio::test]
async fn expired_blockhash_fails_the_step_instead_of_hanging() {
    let s = scenario(0, RESERVE + 10_000_000, vec![ScriptedOutcome::NeverLand]).await;
    s.ledger.set_blocks_per_poll(100);

    let report = tokio::time::timeout(Duration::from_secs(5), s.orchestrator().run())
        .await
        .expect("run must not hang")
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Error);
    let native = &report.records[0];
    assert_eq!(native.status, TxStatus::Error);
    assert!(native.signature.is_some());
    assert!(native.error.as_deref().unwrap_or("").contains("blockhash expired"));
}

#[tokio::test]
async fn existing_destination_accounts_are_not_created_again() {
    let s = scenario(2, 0, vec![]).await;

    let first = s.orchestrator().run().await.unwrap();
    assert_eq!(first.outcome, RunOutcome::Completed);

    let owner = s.signer.pubkey();
    for account in s.ledger.token_balances(&owner).await.unwrap() {
        let ata = spl_associated_token_account::get_associated_token_address(
            &s.destination,
            &account.mint,
        );
        s.ledger.add_account(ata).await;
    }

    let second = s
        .orchestrator()
        .with_continuation(Arc::new(NeverContinue))
        .run()
        .await
        .unwrap();
    assert_eq!(second.outcome, RunOutcome::Completed);

    let sent = s.signer.received().await;
    assert_eq!(sent[0].message.instructions.len(), 4);
    assert_eq!(sent[1].message.instructions.len(), 2);
}

#[tokio::test]
async fn native_skipped_when_batches_spend_the_surplus() {
    // Seven account creations cost more rent than the discovered surplus
    let s = scenario(7, RESERVE + 10_000_000, vec![]).await;
    let ledger = Arc::new(DrainingLedger::new(s.ledger.clone(), 900_000));
    let policy = Arc::new(RecordingPolicy::new(false));

    let report = s
        .orchestrator_over(ledger)
        .with_continuation(policy.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.submissions, 2);
    assert_eq!(policy.asked.load(Ordering::SeqCst), 0);
    assert!(report.records[..7].iter().all(|r| r.status == TxStatus::Success));

    let native = &report.records[7];
    assert_eq!(native.status, TxStatus::Pending);
    assert!(native.error.is_none());
    assert_eq!(s.signer.submission_count().await, 2);
}

#[tokio::test]
async fn native_record_reports_the_amount_actually_sent() {
    let s = scenario(2, RESERVE + 10_000_000, vec![]).await;
    let ledger = Arc::new(DrainingLedger::new(s.ledger.clone(), RESERVE + 2_500_000));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let report = s.orchestrator_over(ledger).run_with_updates(tx).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    let native = &report.records[2];
    assert_eq!(native.status, TxStatus::Success);
    assert_eq!(native.amount, "0.0025");

    let streamed: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|u| u.index == 2)
        .map(|u| u.record.amount)
        .collect();
    assert_eq!(streamed, vec!["0.0025", "0.0025"]);
}
