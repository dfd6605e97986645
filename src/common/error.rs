//! Common Error Types for solsweep
//!
//! Provides unified error handling across all modules and the failure
//! taxonomy the scheduler uses to decide how a failed step affects the run.

use thiserror::Error;

use crate::sweep::builder::BuildError;
use crate::sweep::confirmation::ConfirmationError;
use crate::sweep::tracker::TrackerError;
use crate::sweep::traits::{LedgerError, SignerError};

/// Root error type for solsweep
#[derive(Debug, Error)]
pub enum SweepError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Ledger query errors
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Signer errors
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// Transaction building errors
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Confirmation errors
    #[error("confirmation error: {0}")]
    Confirmation(#[from] ConfirmationError),

    /// Record tracking errors
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

/// How a failed step is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The signer declined; the run is cancelled
    UserRejected,
    /// Not enough native balance to move anything
    InsufficientFunds,
    /// Submission or confirmation call failed
    NetworkOrRpc,
    /// Anything else
    Unexpected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserRejected => write!(f, "user_rejected"),
            Self::InsufficientFunds => write!(f, "insufficient_funds"),
            Self::NetworkOrRpc => write!(f, "network_or_rpc"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

impl SweepError {
    /// Classify this error for the scheduler's failure policy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SweepError::Signer(SignerError::Rejected(_)) => FailureKind::UserRejected,
            SweepError::Signer(SignerError::Rpc(_)) => FailureKind::NetworkOrRpc,
            SweepError::Ledger(_) => FailureKind::NetworkOrRpc,
            SweepError::Build(BuildError::InsufficientFunds { .. }) => {
                FailureKind::InsufficientFunds
            }
            SweepError::Build(BuildError::Ledger(_)) => FailureKind::NetworkOrRpc,
            SweepError::Confirmation(ConfirmationError::TransactionFailed(_)) => {
                FailureKind::Unexpected
            }
            SweepError::Confirmation(_) => FailureKind::NetworkOrRpc,
            _ => FailureKind::Unexpected,
        }
    }

    /// Get error code for logs and notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            SweepError::Config(_) => "CONFIG_ERROR",
            SweepError::Logging(_) => "LOGGING_ERROR",
            SweepError::Ledger(_) => "LEDGER_ERROR",
            SweepError::Signer(SignerError::Rejected(_)) => "USER_REJECTED",
            SweepError::Signer(_) => "SIGNER_ERROR",
            SweepError::Build(BuildError::InsufficientFunds { .. }) => "INSUFFICIENT_FUNDS",
            SweepError::Build(_) => "BUILD_ERROR",
            SweepError::Confirmation(ConfirmationError::BlockhashExpired { .. }) => {
                "BLOCKHASH_EXPIRED"
            }
            SweepError::Confirmation(_) => "CONFIRMATION_ERROR",
            SweepError::Tracker(_) => "TRACKER_ERROR",
        }
    }
}

/// Result type alias using SweepError
pub type Result<T> = std::result::Result<T, SweepError>;
