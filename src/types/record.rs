//! Execution Record Types
//!
//! Per-asset status records and the aggregate run outcome:
//! pending → processing → success | error

use serde::{Deserialize, Serialize};

use super::holding::{AssetHolding, AssetKind};

/// Status of one holding's transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Not yet submitted
    Pending,
    /// Included in the in-flight transaction
    Processing,
    /// Confirmed at the required commitment
    Success,
    /// Build, submission or confirmation failed
    Error,
}

impl Default for TxStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TxStatus {
    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Processing)
                | (TxStatus::Processing, TxStatus::Success)
                | (TxStatus::Processing, TxStatus::Error)
        )
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status record for one holding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Holding identifier (mint or "SOL")
    pub id: String,
    /// Display symbol
    pub symbol: String,
    /// "SOL" or "SPL"
    pub kind: String,
    /// Amount as an exact decimal string
    pub amount: String,
    /// Estimated value
    pub estimated_value: f64,
    /// Current status
    pub status: TxStatus,
    /// Transaction signature once submitted
    pub signature: Option<String>,
    /// Error message if failed
    pub error: Option<String>,
}

impl TransactionRecord {
    /// Create a pending record for a holding
    pub fn pending(holding: &AssetHolding) -> Self {
        Self {
            id: holding.identifier.clone(),
            symbol: holding.symbol.clone(),
            kind: match holding.kind {
                AssetKind::Native => "SOL".to_string(),
                AssetKind::Fungible => "SPL".to_string(),
            },
            amount: holding.ui_amount(),
            estimated_value: holding.estimated_value,
            status: TxStatus::Pending,
            signature: None,
            error: None,
        }
    }
}

/// Aggregate outcome of one sweep invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Not finished yet
    Idle,
    /// Discovery found nothing worth moving; nothing was submitted
    NothingToSweep,
    /// Every executed step succeeded
    Completed,
    /// The signer rejected a transaction
    Cancelled,
    /// At least one step failed
    Error,
}

impl Default for RunOutcome {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::NothingToSweep => write!(f, "nothing_to_sweep"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Streamed whenever a record changes
#[derive(Debug, Clone, Serialize)]
pub struct RecordUpdate {
    /// Index in the run's record list
    pub index: usize,
    /// Record after the change
    pub record: TransactionRecord,
}

/// Final result of a sweep invocation
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Unique run ID
    pub run_id: String,
    /// Swept account
    pub owner: String,
    /// Destination account
    pub destination: String,
    /// One record per holding, fungible first, native last
    pub records: Vec<TransactionRecord>,
    /// Aggregate outcome
    pub outcome: RunOutcome,
    /// Number of transactions handed to the signer
    pub submissions: usize,
    /// Whether discovery failed and the run saw an empty snapshot
    pub discovery_degraded: bool,
    /// RFC 3339 start time
    pub started_at: String,
    /// RFC 3339 finish time
    pub finished_at: String,
}

impl SweepReport {
    pub fn count_by_status(&self, status: TxStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sweep {}: {} | {} records | success: {} | error: {} | pending: {} | submissions: {}",
            self.run_id,
            self.outcome,
            self.records.len(),
            self.count_by_status(TxStatus::Success),
            self.count_by_status(TxStatus::Error),
            self.count_by_status(TxStatus::Pending),
            self.submissions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Processing));
        assert!(TxStatus::Processing.can_transition_to(TxStatus::Success));
        assert!(TxStatus::Processing.can_transition_to(TxStatus::Error));

        assert!(!TxStatus::Pending.can_transition_to(TxStatus::Success));
        assert!(!TxStatus::Success.can_transition_to(TxStatus::Processing));
        assert!(!TxStatus::Error.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Success.can_transition_to(TxStatus::Error));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&RunOutcome::NothingToSweep).unwrap();
        assert_eq!(json, "\"nothing_to_sweep\"");
        assert_eq!(RunOutcome::default(), RunOutcome::Idle);
    }
}
