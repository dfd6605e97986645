//! Execution Tracker
//!
//! Holds one `TransactionRecord` per holding and the run's aggregate outcome.
//! Records of one batch move together since they share one transaction and
//! one signature. A bulk update is validated in full before anything changes,
//! so a rejected transition leaves every record untouched.
//!
//! The tracker is owned by a single sequential run (`&mut self`), which is
//! what keeps two updates from touching the same record concurrently.

use tokio::sync::mpsc::UnboundedSender;

use crate::types::{RecordUpdate, RunOutcome, SweepPlan, TransactionRecord, TxStatus};

/// Tracker errors
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("no record at index {0}")]
    InvalidIndex(usize),

    #[error("record {index}: cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: TxStatus,
        to: TxStatus,
    },

    #[error("run already finished as {0}")]
    AlreadyFinished(RunOutcome),

    #[error("{0} is not a terminal outcome")]
    NotTerminal(RunOutcome),
}

/// Result of one submission step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Error(String),
}

/// Record counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub error: usize,
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {} total | pending: {} | processing: {} | success: {} | error: {}",
            self.total, self.pending, self.processing, self.success, self.error
        )
    }
}

/// Per-holding status records for one sweep
pub struct ExecutionTracker {
    records: Vec<TransactionRecord>,
    outcome: RunOutcome,
    updates: Option<UnboundedSender<RecordUpdate>>,
}

impl ExecutionTracker {
    /// Pending records for every holding of the plan, in plan order
    pub fn from_plan(plan: &SweepPlan) -> Self {
        Self {
            records: plan
                .holdings()
                .into_iter()
                .map(TransactionRecord::pending)
                .collect(),
            outcome: RunOutcome::Idle,
            updates: None,
        }
    }

    /// Stream every record change to `sender`
    pub fn with_updates(mut self, sender: UnboundedSender<RecordUpdate>) -> Self {
        self.updates = Some(sender);
        self
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&TransactionRecord> {
        self.records.get(index)
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    /// Move every record of a batch to processing
    pub fn mark_processing(&mut self, indices: &[usize]) -> Result<(), TrackerError> {
        self.transition(indices, TxStatus::Processing, None, None)
    }

    /// Move every record of a batch to its terminal status
    pub fn mark_result(
        &mut self,
        indices: &[usize],
        outcome: StepOutcome,
        signature: Option<String>,
    ) -> Result<(), TrackerError> {
        match outcome {
            StepOutcome::Success => self.transition(indices, TxStatus::Success, signature, None),
            StepOutcome::Error(message) => {
                self.transition(indices, TxStatus::Error, signature, Some(message))
            }
        }
    }

    /// Replace a record's amount with what is actually being sent
    ///
    /// Not streamed on its own; the record's next transition carries it.
    pub fn set_amount(&mut self, index: usize, amount: String) -> Result<(), TrackerError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(TrackerError::InvalidIndex(index))?;
        record.amount = amount;
        Ok(())
    }

    /// Set the run outcome; allowed once, to a terminal value
    pub fn finish(&mut self, outcome: RunOutcome) -> Result<(), TrackerError> {
        if self.outcome != RunOutcome::Idle {
            return Err(TrackerError::AlreadyFinished(self.outcome));
        }
        if outcome == RunOutcome::Idle {
            return Err(TrackerError::NotTerminal(outcome));
        }

        self.outcome = outcome;
        Ok(())
    }

    pub fn stats(&self) -> TrackerStats {
        let count = |status| self.records.iter().filter(|r| r.status == status).count();

        TrackerStats {
            total: self.records.len(),
            pending: count(TxStatus::Pending),
            processing: count(TxStatus::Processing),
            success: count(TxStatus::Success),
            error: count(TxStatus::Error),
        }
    }

    pub fn into_records(self) -> Vec<TransactionRecord> {
        self.records
    }

    fn transition(
        &mut self,
        indices: &[usize],
        to: TxStatus,
        signature: Option<String>,
        error: Option<String>,
    ) -> Result<(), TrackerError> {
        for &index in indices {
            let record = self
                .records
                .get(index)
                .ok_or(TrackerError::InvalidIndex(index))?;

            if !record.status.can_transition_to(to) {
                return Err(TrackerError::InvalidTransition {
                    index,
                    from: record.status,
                    to,
                });
            }
        }

        for &index in indices {
            let record = &mut self.records[index];
            record.status = to;
            if signature.is_some() {
                record.signature = signature.clone();
            }
            if error.is_some() {
                record.error = error.clone();
            }

            if let Some(sender) = &self.updates {
                // A dropped receiver only means nobody is listening
                let _ = sender.send(RecordUpdate {
                    index,
                    record: record.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetHolding, TransferBatch};
    use solana_sdk::pubkey::Pubkey;

    fn plan(fungible: usize, native: bool) -> SweepPlan {
        let holdings: Vec<AssetHolding> = (0..fungible)
            .map(|_| AssetHolding::fungible(Pubkey::new_unique(), Pubkey::new_unique(), 1, 0, 1.0))
            .collect();

        SweepPlan {
            batches: vec![TransferBatch {
                number: 1,
                record_indices: (0..fungible).collect(),
                holdings,
            }],
            native: native.then(|| (fungible, AssetHolding::native(Pubkey::new_unique(), 5, 1.0))),
        }
    }

    #[test]
    fn test_batch_moves_together() {
        let mut tracker = ExecutionTracker::from_plan(&plan(3, true));
        assert_eq!(tracker.stats().pending, 4);

        tracker.mark_processing(&[0, 1, 2]).unwrap();
        assert_eq!(tracker.stats().processing, 3);

        tracker
            .mark_result(&[0, 1, 2], StepOutcome::Success, Some("sig".to_string()))
            .unwrap();

        let stats = tracker.stats();
        assert_eq!(stats.success, 3);
        assert_eq!(stats.pending, 1);
        assert!(tracker.records()[..3]
            .iter()
            .all(|r| r.signature.as_deref() == Some("sig")));
        assert_eq!(tracker.records()[3].id, "SOL");
    }

    #[test]
    fn test_invalid_transition_leaves_records_untouched() {
        let mut tracker = ExecutionTracker::from_plan(&plan(3, false));
        tracker.mark_processing(&[0]).unwrap();
        tracker.mark_result(&[0], StepOutcome::Success, None).unwrap();

        // Record 0 is terminal; the whole update must be refused
        let result = tracker.mark_processing(&[1, 0]);
        assert!(matches!(
            result,
            Err(TrackerError::InvalidTransition { index: 0, .. })
        ));
        assert_eq!(tracker.record(1).unwrap().status, TxStatus::Pending);

        // Skipping processing is not allowed either
        assert!(tracker.mark_result(&[2], StepOutcome::Success, None).is_err());
        assert!(matches!(
            tracker.mark_processing(&[7]),
            Err(TrackerError::InvalidIndex(7))
        ));
    }

    #[test]
    fn test_error_message_recorded() {
        let mut tracker = ExecutionTracker::from_plan(&plan(1, false));
        tracker.mark_processing(&[0]).unwrap();
        tracker
            .mark_result(&[0], StepOutcome::Error("rpc down".to_string()), None)
            .unwrap();

        let record = tracker.record(0).unwrap();
        assert_eq!(record.status, TxStatus::Error);
        assert_eq!(record.error.as_deref(), Some("rpc down"));
        assert!(record.signature.is_none());
    }

    #[test]
    fn test_outcome_set_once() {
        let mut tracker = ExecutionTracker::from_plan(&plan(1, false));
        assert_eq!(tracker.outcome(), RunOutcome::Idle);
        assert!(matches!(
            tracker.finish(RunOutcome::Idle),
            Err(TrackerError::NotTerminal(_))
        ));

        tracker.finish(RunOutcome::Completed).unwrap();
        assert!(matches!(
            tracker.finish(RunOutcome::Error),
            Err(TrackerError::AlreadyFinished(RunOutcome::Completed))
        ));
        assert_eq!(tracker.outcome(), RunOutcome::Completed);
    }

    #[tokio::test]
    async fn test_amount_correction_travels_with_next_transition() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tracker = ExecutionTracker::from_plan(&plan(1, true)).with_updates(tx);

        tracker.set_amount(1, "0.0042".to_string()).unwrap();
        assert!(rx.try_recv().is_err());

        tracker.mark_processing(&[1]).unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.record.amount, "0.0042");
        assert!(matches!(
            tracker.set_amount(5, "1".to_string()),
            Err(TrackerError::InvalidIndex(5))
        ));
    }

    #[tokio::test]
    async fn test_updates_are_streamed() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tracker = ExecutionTracker::from_plan(&plan(2, false)).with_updates(tx);

        tracker.mark_processing(&[0, 1]).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(second.record.status, TxStatus::Processing);
    }
}
