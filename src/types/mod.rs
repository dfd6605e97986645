//! Shared Types Module
//!
//! Data types shared across the sweep pipeline.

pub mod holding;
pub mod record;
pub mod units;

// Re-exports for convenience
pub use holding::{
    AssetHolding, AssetKind, SweepPlan, TransferBatch, MAX_BATCH_SIZE, NATIVE_IDENTIFIER,
};
pub use record::{RecordUpdate, RunOutcome, SweepReport, TransactionRecord, TxStatus};
pub use units::{
    format_amount, lamports_to_display, lamports_to_sol, parse_sol, raw_to_ui,
    LAMPORTS_PER_SOL, NATIVE_DECIMALS,
};
