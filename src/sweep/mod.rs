//! Sweep Module
//!
//! Moves every holding of one account to a destination account:
//! 1. Discovery reads the native and SPL token balances
//! 2. The scheduler plans fungible batches of at most five transfers, native last
//! 3. Each step is built, signed once and confirmed before the next one starts
//! 4. The tracker records per-holding status and the run outcome
//!
//! # Failure handling
//!
//! A signer rejection cancels the run. Any other failure marks the step's
//! records as errored and, if steps remain, asks the `ContinuationPolicy`.
//! A native step with nothing left above the reserve is skipped, not failed.

pub mod builder;
pub mod confirmation;
pub mod continuation;
pub mod discovery;
pub mod notify;
pub mod scheduler;
pub mod tracker;
pub mod traits;

// Re-exports for convenience
pub use builder::{BuildError, BuiltTransaction, TransactionBuilder};
pub use confirmation::{ConfirmationError, ConfirmationWaiter};
pub use continuation::{AlwaysContinue, ContinuationPolicy, FailureContext, NeverContinue};
pub use discovery::{
    discover_holdings, sweepable_native, DiscoveryResult, StaticPriceEstimator, ValueEstimator,
};
pub use notify::{
    notify_quietly, LogNotifier, NoopNotifier, NotificationSink, NotifyError, SweepEvent,
    WebhookNotifier,
};
pub use scheduler::{plan, PreparedSweep, SweepOrchestrator};
pub use tracker::{ExecutionTracker, StepOutcome, TrackerError, TrackerStats};
pub use traits::{
    Ledger, LedgerError, LedgerResult, RecentBlockhash, SendOptions, SignatureState, SignerError,
    SweepSigner, TokenAccountBalance,
};
