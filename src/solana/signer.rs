//! Transaction Signers
//!
//! `KeypairSigner` signs with the owner's local keypair and submits through
//! the RPC node. `ApprovingSigner` puts an approval step in front of any
//! signer; declining surfaces as `SignerError::Rejected`.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer as SolanaSigner};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;

use crate::sweep::traits::{SendOptions, SignerError, SweepSigner};

/// Keypair loading errors
#[derive(Debug, thiserror::Error)]
pub enum KeypairError {
    #[error("cannot read keypair file {0}: {1}")]
    Read(String, String),

    #[error("invalid keypair: {0}")]
    Invalid(String),
}

/// Load a keypair from a JSON byte-array file (solana-keygen format)
pub fn load_keypair_from_file(path: &str) -> Result<Keypair, KeypairError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| KeypairError::Read(path.to_string(), e.to_string()))?;
    let bytes: Vec<u8> =
        serde_json::from_str(&content).map_err(|e| KeypairError::Invalid(e.to_string()))?;
    Keypair::try_from(bytes.as_slice()).map_err(|e| KeypairError::Invalid(e.to_string()))
}

// ============================================================================
// Keypair Signer
// ============================================================================

/// Signs with a local keypair and submits over RPC
pub struct KeypairSigner {
    keypair: Keypair,
    rpc: Arc<RpcClient>,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair, rpc: Arc<RpcClient>) -> Self {
        Self { keypair, rpc }
    }

    /// Sign `tx` against the blockhash it was built with
    pub fn sign(&self, mut tx: Transaction) -> Result<Transaction, SignerError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(tx)
    }
}

#[async_trait]
impl SweepSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn send_transaction(
        &self,
        tx: Transaction,
        options: &SendOptions,
    ) -> Result<Signature, SignerError> {
        let tx = self.sign(tx)?;

        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(options.preflight_commitment),
            max_retries: options.max_retries,
            ..RpcSendTransactionConfig::default()
        };

        let signature = self
            .rpc
            .send_transaction_with_config(&tx, config)
            .await
            .map_err(|e| SignerError::Rpc(e.to_string()))?;

        tracing::debug!(
            target: "solsweep::signer",
            signature = %signature,
            instructions = tx.message.instructions.len(),
            "Transaction submitted"
        );

        Ok(signature)
    }

    fn signer_type(&self) -> &'static str {
        "keypair"
    }
}

// ============================================================================
// Approval
// ============================================================================

/// What an approver is shown before a transaction is signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub fee_payer: Pubkey,
    pub instructions: usize,
    /// Programs invoked, in instruction order
    pub programs: Vec<Pubkey>,
}

impl TransactionSummary {
    pub fn of(tx: &Transaction) -> Self {
        let keys = &tx.message.account_keys;
        Self {
            fee_payer: keys.first().copied().unwrap_or_default(),
            instructions: tx.message.instructions.len(),
            programs: tx
                .message
                .instructions
                .iter()
                .filter_map(|ix| keys.get(ix.program_id_index as usize).copied())
                .collect(),
        }
    }
}

/// Decides whether a transaction may be signed
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, summary: &TransactionSummary) -> bool;
}

/// Approves everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _summary: &TransactionSummary) -> bool {
        true
    }
}

/// Asks an `Approver` before delegating to the inner signer
pub struct ApprovingSigner<S> {
    inner: S,
    approver: Arc<dyn Approver>,
}

impl<S: SweepSigner> ApprovingSigner<S> {
    pub fn new(inner: S, approver: Arc<dyn Approver>) -> Self {
        Self { inner, approver }
    }
}

#[async_trait]
impl<S: SweepSigner> SweepSigner for ApprovingSigner<S> {
    fn pubkey(&self) -> Pubkey {
        self.inner.pubkey()
    }

    async fn send_transaction(
        &self,
        tx: Transaction,
        options: &SendOptions,
    ) -> Result<Signature, SignerError> {
        let summary = TransactionSummary::of(&tx);
        if !self.approver.approve(&summary).await {
            return Err(SignerError::Rejected("declined by owner".to_string()));
        }

        self.inner.send_transaction(tx, options).await
    }

    fn signer_type(&self) -> &'static str {
        self.inner.signer_type()
    }
}
