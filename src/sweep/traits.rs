//! External Capability Traits
//!
//! Abstract interfaces for the ledger and the signer. The sweep core only
//! talks to these; `SolClient`/`KeypairSigner` back them against a real RPC
//! node and `MemoryLedger`/`ScriptedSigner` back them in tests.

use async_trait::async_trait;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

/// Ledger query errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type for ledger queries
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Signer errors
#[derive(Debug, Error)]
pub enum SignerError {
    /// The owner declined to sign
    #[error("rejected by signer: {0}")]
    Rejected(String),

    /// Signing failed locally
    #[error("signing failed: {0}")]
    Signing(String),

    /// Submission failed
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// One SPL token account owned by the swept account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountBalance {
    /// Token account address
    pub address: Pubkey,
    /// Mint
    pub mint: Pubkey,
    /// Raw balance
    pub amount: u64,
    /// Mint decimals
    pub decimals: u8,
}

/// Blockhash a transaction is built against, with its expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: Hash,
    /// Last block height at which a transaction using `blockhash` can land
    pub last_valid_block_height: u64,
}

/// Status of a submitted signature at a given commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Unknown to the node, or not yet at the requested commitment
    Pending,
    /// Reached the requested commitment without error
    Confirmed,
    /// Landed with an on-chain error
    Failed(String),
}

/// Options passed along with a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: CommitmentLevel,
    pub max_retries: Option<usize>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: CommitmentLevel::Confirmed,
            max_retries: None,
        }
    }
}

/// Read access to the ledger
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Native balance in lamports
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64>;

    /// All SPL token accounts owned by `owner`
    async fn token_balances(&self, owner: &Pubkey) -> LedgerResult<Vec<TokenAccountBalance>>;

    /// Whether an account exists at `address`
    async fn account_exists(&self, address: &Pubkey) -> LedgerResult<bool>;

    /// Blockhash for building a transaction
    async fn latest_blockhash(&self) -> LedgerResult<RecentBlockhash>;

    /// Current block height
    async fn block_height(&self) -> LedgerResult<u64>;

    /// Status of a submitted signature at `commitment`
    async fn signature_state(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> LedgerResult<SignatureState>;
}

/// Signs and submits transactions on behalf of the swept account
#[async_trait]
pub trait SweepSigner: Send + Sync {
    /// Account that signs and pays fees
    fn pubkey(&self) -> Pubkey;

    /// Sign `tx` (already carrying its blockhash) and submit it
    async fn send_transaction(
        &self,
        tx: Transaction,
        options: &SendOptions,
    ) -> Result<Signature, SignerError>;

    /// Signer type description
    fn signer_type(&self) -> &'static str;
}
