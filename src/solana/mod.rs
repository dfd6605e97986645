//! Solana Infrastructure Module
//!
//! Concrete backends for the sweep's capability traits:
//! - `SolClient`: ledger reads over the nonblocking RPC client
//! - `KeypairSigner` / `ApprovingSigner`: signing and submission
//! - `MemoryLedger` / `ScriptedSigner`: deterministic stand-ins for tests

pub mod client;
pub mod memory;
pub mod signer;

// Re-exports for convenience
pub use client::{parse_token_account, SolClient, DEVNET_RPC};
pub use memory::{MemoryLedger, ScriptedOutcome, ScriptedSigner};
pub use signer::{
    load_keypair_from_file, ApprovingSigner, Approver, AutoApprove, KeypairError, KeypairSigner,
    TransactionSummary,
};
