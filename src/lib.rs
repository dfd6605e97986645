//! solsweep - Account Sweep and Migration Tool
//!
//! Moves every holding of a Solana account the operator controls (native SOL
//! and SPL token balances) to a destination account of their choosing.
//!
//! ## Pipeline
//!
//! 1. **Discovery** - native balance minus a fee reserve, plus every non-empty
//!    SPL token account, ranked by estimated value
//! 2. **Planning** - token transfers grouped five per transaction, native last
//! 3. **Execution** - one signed submission per step, each confirmed before
//!    the next is built
//! 4. **Reporting** - per-holding status records and a run outcome
//!
//! The owner's own signer signs every transaction; nothing is submitted
//! without it.

pub mod common;
pub mod solana;
pub mod sweep;
pub mod types;

// Re-exports: configuration and errors
pub use common::{
    init_from_config, init_logging, ConfigError, FailureKind, LogLevel, Network, SweepConfig,
    SweepError, SweepSettings,
};

// Re-exports: sweep pipeline
pub use sweep::{
    plan, AlwaysContinue, ContinuationPolicy, FailureContext, Ledger, LogNotifier, NeverContinue,
    NoopNotifier, NotificationSink, StaticPriceEstimator, SweepEvent, SweepOrchestrator,
    SweepSigner, WebhookNotifier,
};

// Re-exports: Solana backends
pub use solana::{
    load_keypair_from_file, ApprovingSigner, Approver, KeypairSigner, MemoryLedger,
    ScriptedOutcome, ScriptedSigner, SolClient,
};

// Re-exports: data model
pub use types::{
    AssetHolding, AssetKind, RecordUpdate, RunOutcome, SweepPlan, SweepReport, TransactionRecord,
    TxStatus,
};
