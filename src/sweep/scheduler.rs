//! Batch Scheduler
//!
//! Turns discovered holdings into a plan and executes it. Fungible holdings go
//! out in transactions of at most `MAX_BATCH_SIZE` transfers, in discovery
//! order; the native transfer always runs last so earlier steps can still pay
//! their fees and account rent.
//!
//! Execution is strictly sequential. A step is built, submitted once and
//! awaited to a terminal state before the next step is built, so at most one
//! signer call is ever in flight.

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

use super::builder::{BuiltTransaction, TransactionBuilder};
use super::confirmation::ConfirmationWaiter;
use super::continuation::{ContinuationPolicy, FailureContext, NeverContinue};
use super::discovery::{discover_holdings, StaticPriceEstimator, ValueEstimator};
use super::notify::{notify_quietly, NoopNotifier, NotificationSink, SweepEvent};
use super::tracker::{ExecutionTracker, StepOutcome};
use super::traits::{Ledger, SendOptions, SweepSigner};
use crate::common::config::SweepSettings;
use crate::common::error::{FailureKind, Result, SweepError};
use crate::common::logging::{generate_run_id, log_run_finished, log_step_event, EventCategory};
use crate::types::{
    format_amount, AssetHolding, RecordUpdate, RunOutcome, SweepPlan, SweepReport, TransferBatch,
    MAX_BATCH_SIZE,
};

/// Split holdings into fungible batches plus a trailing native step
///
/// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`. Record indices follow
/// execution order: fungible holdings first, then the native one.
pub fn plan(holdings: Vec<AssetHolding>, batch_size: usize) -> SweepPlan {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let (native, fungible): (Vec<_>, Vec<_>) = holdings.into_iter().partition(|h| h.is_native());

    let fungible_count = fungible.len();
    let mut batches = Vec::with_capacity(fungible_count.div_ceil(batch_size));

    for (i, chunk) in fungible.chunks(batch_size).enumerate() {
        let start = i * batch_size;
        batches.push(TransferBatch {
            number: i + 1,
            holdings: chunk.to_vec(),
            record_indices: (start..start + chunk.len()).collect(),
        });
    }

    SweepPlan {
        batches,
        native: native.into_iter().next().map(|h| (fungible_count, h)),
    }
}

/// One submission in execution order
enum Step<'a> {
    Batch(&'a TransferBatch),
    Native {
        index: usize,
        holding: &'a AssetHolding,
    },
}

impl Step<'_> {
    fn record_indices(&self) -> Vec<usize> {
        match self {
            Step::Batch(batch) => batch.record_indices.clone(),
            Step::Native { index, .. } => vec![*index],
        }
    }

    fn holdings(&self) -> Vec<&AssetHolding> {
        match self {
            Step::Batch(batch) => batch.holdings.iter().collect(),
            Step::Native { holding, .. } => vec![*holding],
        }
    }

    fn native_index(&self) -> Option<usize> {
        match self {
            Step::Batch(_) => None,
            Step::Native { index, .. } => Some(*index),
        }
    }

    fn category(&self) -> EventCategory {
        match self {
            Step::Batch(_) => EventCategory::Batch,
            Step::Native { .. } => EventCategory::Native,
        }
    }
}

/// A built step, before its records move to processing
struct PreparedStep {
    built: BuiltTransaction,
    /// Amount the native transfer actually moves
    native_amount: Option<String>,
}

/// A failed step; the signature is set when the transaction was submitted
struct StepFailure {
    error: SweepError,
    signature: Option<Signature>,
}

fn failed(error: impl Into<SweepError>) -> StepFailure {
    StepFailure {
        error: error.into(),
        signature: None,
    }
}

/// Discovery result and plan, without executing anything
#[derive(Debug, Clone)]
pub struct PreparedSweep {
    pub plan: SweepPlan,
    pub discovery_degraded: bool,
}

/// Runs a sweep of one account into its configured destination
pub struct SweepOrchestrator {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn SweepSigner>,
    notifier: Arc<dyn NotificationSink>,
    continuation: Arc<dyn ContinuationPolicy>,
    estimator: Arc<dyn ValueEstimator>,
    settings: SweepSettings,
    send_options: SendOptions,
}

impl SweepOrchestrator {
    /// Create an orchestrator that stops at the first failure and sends no notifications
    pub fn new(ledger: Arc<dyn Ledger>, signer: Arc<dyn SweepSigner>, settings: SweepSettings) -> Self {
        Self {
            ledger,
            signer,
            notifier: Arc::new(NoopNotifier),
            continuation: Arc::new(NeverContinue),
            estimator: Arc::new(StaticPriceEstimator::default()),
            settings,
            send_options: SendOptions::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_continuation(mut self, continuation: Arc<dyn ContinuationPolicy>) -> Self {
        self.continuation = continuation;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn ValueEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_send_options(mut self, send_options: SendOptions) -> Self {
        self.send_options = send_options;
        self
    }

    /// Swept account
    pub fn owner(&self) -> Pubkey {
        self.signer.pubkey()
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Discover holdings and plan the sweep
    pub async fn prepare(&self) -> Result<PreparedSweep> {
        let owner = self.owner();
        self.settings.validate(&owner)?;

        let discovery =
            discover_holdings(self.ledger.as_ref(), &owner, &self.settings, self.estimator.as_ref())
                .await;

        Ok(PreparedSweep {
            plan: plan(discovery.holdings, self.settings.batch_size),
            discovery_degraded: discovery.degraded,
        })
    }

    /// Run the sweep to its outcome
    pub async fn run(&self) -> Result<SweepReport> {
        self.execute(None).await
    }

    /// Run the sweep, streaming every record change to `updates`
    pub async fn run_with_updates(&self, updates: UnboundedSender<RecordUpdate>) -> Result<SweepReport> {
        self.execute(Some(updates)).await
    }

    async fn execute(&self, updates: Option<UnboundedSender<RecordUpdate>>) -> Result<SweepReport> {
        let run_id = generate_run_id();
        let started_at = Utc::now();
        let timer = Instant::now();
        let owner = self.owner();

        let prepared = self.prepare().await?;
        let plan = prepared.plan;

        let mut tracker = ExecutionTracker::from_plan(&plan);
        if let Some(sender) = updates {
            tracker = tracker.with_updates(sender);
        }

        let mut submissions = 0;

        if plan.is_empty() {
            tracing::info!(
                target: "solsweep::scheduler",
                run_id = %run_id,
                degraded = prepared.discovery_degraded,
                "Nothing to sweep"
            );
            tracker.finish(RunOutcome::NothingToSweep)?;
        } else {
            notify_quietly(
                self.notifier.as_ref(),
                &SweepEvent::SweepStarted {
                    run_id: run_id.clone(),
                    owner: owner.to_string(),
                    destination: self.settings.destination.to_string(),
                    holdings: tracker.records().len(),
                    steps: plan.step_count(),
                },
            )
            .await;

            let outcome = self
                .execute_plan(&run_id, &plan, &mut tracker, &mut submissions)
                .await?;
            tracker.finish(outcome)?;
        }

        let outcome = tracker.outcome();
        let duration_ms = timer.elapsed().as_millis() as u64;
        log_run_finished(&run_id, &outcome.to_string(), submissions, duration_ms);
        tracing::info!(target: "solsweep::scheduler", run_id = %run_id, "{}", tracker.stats());

        notify_quietly(
            self.notifier.as_ref(),
            &SweepEvent::SweepFinished {
                run_id: run_id.clone(),
                outcome: outcome.to_string(),
                submissions,
            },
        )
        .await;

        Ok(SweepReport {
            run_id,
            owner: owner.to_string(),
            destination: self.settings.destination.to_string(),
            records: tracker.into_records(),
            outcome,
            submissions,
            discovery_degraded: prepared.discovery_degraded,
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
        })
    }

    async fn execute_plan(
        &self,
        run_id: &str,
        plan: &SweepPlan,
        tracker: &mut ExecutionTracker,
        submissions: &mut usize,
    ) -> Result<RunOutcome> {
        let steps: Vec<Step<'_>> = plan
            .batches
            .iter()
            .map(Step::Batch)
            .chain(
                plan.native
                    .iter()
                    .map(|(index, holding)| Step::Native { index: *index, holding }),
            )
            .collect();
        let total_steps = steps.len();
        let mut any_failed = false;

        for (i, step) in steps.iter().enumerate() {
            let number = i + 1;
            if i > 0 && !self.settings.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }

            let indices = step.record_indices();
            let step_timer = Instant::now();

            let prepared = match self.build_step(step).await {
                Err(error) if error.failure_kind() == FailureKind::InsufficientFunds => {
                    // Earlier steps spent the surplus on fees and rent
                    tracing::info!(
                        target: "solsweep::scheduler",
                        run_id = %run_id,
                        step = number,
                        reason = %error,
                        "Skipping native transfer, nothing left above the reserve"
                    );
                    continue;
                }
                other => other,
            };

            if let (Ok(prepared), Some(index)) = (&prepared, step.native_index()) {
                if let Some(sent) = &prepared.native_amount {
                    tracker.set_amount(index, sent.clone())?;
                }
            }
            tracker.mark_processing(&indices)?;

            tracing::info!(
                target: "solsweep::scheduler",
                run_id = %run_id,
                step = number,
                total_steps,
                items = indices.len(),
                "Executing step"
            );

            let result = match prepared {
                Ok(prepared) => self.submit_step(run_id, step, prepared, submissions).await,
                Err(error) => Err(failed(error)),
            };
            let duration_ms = step_timer.elapsed().as_millis() as u64;

            let failure = match result {
                Ok(signature) => {
                    let signature = signature.to_string();
                    tracker.mark_result(&indices, StepOutcome::Success, Some(signature.clone()))?;
                    log_step_event(
                        run_id,
                        step.category(),
                        number,
                        indices.len(),
                        Some(signature.as_str()),
                        duration_ms,
                        None,
                    );
                    continue;
                }
                Err(failure) => failure,
            };

            let message = failure.error.to_string();
            let signature = failure.signature.map(|s| s.to_string());
            let kind = failure.error.failure_kind();
            let code = failure.error.error_code();

            tracker.mark_result(&indices, StepOutcome::Error(message.clone()), signature.clone())?;
            log_step_event(
                run_id,
                step.category(),
                number,
                indices.len(),
                signature.as_deref(),
                duration_ms,
                Some((code, message.as_str())),
            );
            notify_quietly(
                self.notifier.as_ref(),
                &SweepEvent::StepFailed {
                    run_id: run_id.to_string(),
                    step: number,
                    code: code.to_string(),
                    message: message.clone(),
                },
            )
            .await;

            if kind == FailureKind::UserRejected {
                tracing::warn!(
                    target: "solsweep::scheduler",
                    run_id = %run_id,
                    step = number,
                    "Signer rejected the transaction, cancelling run"
                );
                return Ok(RunOutcome::Cancelled);
            }

            any_failed = true;

            if number < total_steps {
                let context = FailureContext {
                    run_id: run_id.to_string(),
                    step: number,
                    total_steps,
                    kind,
                    message,
                    native_pending: plan.native.is_some() && matches!(step, Step::Batch(_)),
                };

                if !self.continuation.should_continue(&context).await {
                    tracing::warn!(
                        target: "solsweep::scheduler",
                        run_id = %run_id,
                        step = number,
                        remaining = context.remaining_steps(),
                        "Stopping after failed step"
                    );
                    return Ok(RunOutcome::Error);
                }
            }
        }

        Ok(if any_failed {
            RunOutcome::Error
        } else {
            RunOutcome::Completed
        })
    }

    async fn build_step(&self, step: &Step<'_>) -> Result<PreparedStep> {
        let builder =
            TransactionBuilder::new(self.ledger.clone(), self.owner(), self.settings.destination);

        match step {
            Step::Batch(batch) => Ok(PreparedStep {
                built: builder.build_batch(batch).await?,
                native_amount: None,
            }),
            Step::Native { holding, .. } => {
                let native = builder
                    .build_native(self.settings.native_reserve_lamports)
                    .await?;
                Ok(PreparedStep {
                    built: native.built,
                    native_amount: Some(format_amount(native.lamports, holding.decimals)),
                })
            }
        }
    }

    async fn submit_step(
        &self,
        run_id: &str,
        step: &Step<'_>,
        prepared: PreparedStep,
        submissions: &mut usize,
    ) -> std::result::Result<Signature, StepFailure> {
        let owner = self.owner();
        let PreparedStep {
            built,
            native_amount,
        } = prepared;

        if !built.created_accounts.is_empty() {
            tracing::debug!(
                target: "solsweep::scheduler",
                run_id = %run_id,
                created = built.created_accounts.len(),
                "Creating destination token accounts"
            );
        }

        *submissions += 1;
        let signature = self
            .signer
            .send_transaction(built.transaction, &self.send_options)
            .await
            .map_err(failed)?;

        for holding in step.holdings() {
            let amount = native_amount.clone().unwrap_or_else(|| holding.ui_amount());

            notify_quietly(
                self.notifier.as_ref(),
                &SweepEvent::TransactionSent {
                    run_id: run_id.to_string(),
                    address: owner.to_string(),
                    kind: holding.kind.to_string(),
                    mint: holding.mint.map(|m| m.to_string()),
                    symbol: holding.symbol.clone(),
                    amount,
                    signature: signature.to_string(),
                },
            )
            .await;
        }

        let waiter = ConfirmationWaiter::new(self.ledger.clone(), self.settings.confirmation);
        waiter
            .wait(&signature, built.last_valid_block_height)
            .await
            .map_err(|e| StepFailure {
                error: e.into(),
                signature: Some(signature),
            })?;

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::memory::{MemoryLedger, ScriptedOutcome, ScriptedSigner};
    use crate::sweep::continuation::MockContinuationPolicy;
    use crate::sweep::notify::{MockNotificationSink, NotifyError};
    use crate::types::{TxStatus, LAMPORTS_PER_SOL};
    use std::time::Duration;

    fn fungible(value: f64) -> AssetHolding {
        AssetHolding::fungible(Pubkey::new_unique(), Pubkey::new_unique(), 1_000, 3, value)
    }

    #[test]
    fn test_plan_batches_and_native_last() {
        let mut holdings: Vec<_> = (0..7).map(|i| fungible(100.0 - i as f64)).collect();
        // Highest value, but still planned last
        holdings.insert(0, AssetHolding::native(Pubkey::new_unique(), LAMPORTS_PER_SOL, 1_000.0));

        let plan = plan(holdings, MAX_BATCH_SIZE);

        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].len(), 5);
        assert_eq!(plan.batches[1].len(), 2);
        assert_eq!(plan.batches[1].record_indices, vec![5, 6]);
        assert_eq!(plan.native.as_ref().map(|(i, _)| *i), Some(7));
        assert_eq!(plan.step_count(), 3);

        let holdings = plan.holdings();
        assert!(holdings[..7].iter().all(|h| !h.is_native()));
        assert!(holdings[7].is_native());
        assert_eq!(holdings[0].estimated_value, 100.0);
    }

    #[test]
    fn test_plan_batch_counts() {
        for count in [0usize, 1, 4, 5, 6, 10, 11, 23] {
            let plan = plan((0..count).map(|_| fungible(1.0)).collect(), MAX_BATCH_SIZE);
            assert_eq!(plan.batches.len(), count.div_ceil(MAX_BATCH_SIZE));
            assert!(plan.batches.iter().all(|b| b.len() <= MAX_BATCH_SIZE));
            assert_eq!(plan.batches.iter().map(|b| b.len()).sum::<usize>(), count);
            assert!(plan.native.is_none());
        }
    }

    #[test]
    fn test_plan_clamps_batch_size() {
        let plan = plan((0..6).map(|_| fungible(1.0)).collect(), 50);
        assert_eq!(plan.batches.len(), 2);

        let plan = super::plan((0..3).map(|_| fungible(1.0)).collect(), 0);
        assert_eq!(plan.batches.len(), 3);
    }

    struct Harness {
        ledger: Arc<MemoryLedger>,
        signer: Arc<ScriptedSigner>,
        settings: SweepSettings,
    }

    async fn harness(tokens: usize, native_lamports: u64, script: Vec<ScriptedOutcome>) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let signer = Arc::new(ScriptedSigner::new(ledger.clone()).with_script(script));
        let owner = signer.pubkey();

        ledger.set_native_balance(owner, native_lamports).await;
        for i in 0..tokens {
            ledger
                .add_token_account(owner, Pubkey::new_unique(), 1_000_000 * (tokens - i) as u64, 6)
                .await;
        }

        let mut settings = SweepSettings::new(Pubkey::new_unique());
        settings.inter_batch_delay = Duration::ZERO;
        settings.confirmation.poll_interval = Duration::from_millis(1);
        settings.confirmation.max_wait = Duration::from_millis(200);

        Harness {
            ledger,
            signer,
            settings,
        }
    }

    impl Harness {
        fn orchestrator(&self) -> SweepOrchestrator {
            SweepOrchestrator::new(self.ledger.clone(), self.signer.clone(), self.settings.clone())
        }
    }

    #[tokio::test]
    async fn test_continuation_not_asked_after_rejection() {
        let h = harness(6, 11_000_000, vec![ScriptedOutcome::Reject]).await;

        let mut policy = MockContinuationPolicy::new();
        policy.expect_should_continue().never();

        let report = h
            .orchestrator()
            .with_continuation(Arc::new(policy))
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.submissions, 1);
        assert_eq!(report.count_by_status(TxStatus::Error), 5);
        assert_eq!(report.count_by_status(TxStatus::Pending), 2);
    }

    #[tokio::test]
    async fn test_continuation_accepted_runs_remaining_steps() {
        let h = harness(
            6,
            11_000_000,
            vec![ScriptedOutcome::SubmitError("node unhealthy".into())],
        )
        .await;

        let mut policy = MockContinuationPolicy::new();
        policy
            .expect_should_continue()
            .withf(|ctx| ctx.step == 1 && ctx.total_steps == 3 && ctx.native_pending)
            .times(1)
            .returning(|_| true);

        let report = h
            .orchestrator()
            .with_continuation(Arc::new(policy))
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Error);
        assert_eq!(report.submissions, 3);
        assert_eq!(report.count_by_status(TxStatus::Error), 5);
        assert_eq!(report.count_by_status(TxStatus::Success), 2);
    }

    #[tokio::test]
    async fn test_last_step_failure_does_not_prompt() {
        let h = harness(
            0,
            11_000_000,
            vec![ScriptedOutcome::FailOnChain("InsufficientFundsForRent".into())],
        )
        .await;

        let mut policy = MockContinuationPolicy::new();
        policy.expect_should_continue().never();

        let report = h
            .orchestrator()
            .with_continuation(Arc::new(policy))
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Error);
        let native = &report.records[0];
        assert_eq!(native.status, TxStatus::Error);
        assert!(native.signature.is_some());
    }

    #[tokio::test]
    async fn test_notification_failures_do_not_change_outcome() {
        let h = harness(2, 11_000_000, vec![]).await;

        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .returning(|_| Err(NotifyError::Delivery("connection refused".into())));
        sink.expect_sink_type().return_const("mock");

        let report = h
            .orchestrator()
            .with_notifier(Arc::new(sink))
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.count_by_status(TxStatus::Success), 3);
    }

    #[tokio::test]
    async fn test_destination_equal_to_owner_is_refused() {
        let mut h = harness(1, 11_000_000, vec![]).await;
        h.settings.destination = h.signer.pubkey();

        let result = h.orchestrator().run().await;
        assert!(matches!(result, Err(SweepError::Config(_))));
        assert_eq!(h.signer.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_record_updates_streamed() {
        let h = harness(1, 0, vec![]).await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let report = h.orchestrator().run_with_updates(tx).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);

        let statuses: Vec<TxStatus> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|u| u.record.status)
            .collect();
        assert_eq!(statuses, vec![TxStatus::Processing, TxStatus::Success]);
    }
}
