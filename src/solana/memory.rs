//! In-Memory Ledger and Scripted Signer
//!
//! Deterministic stand-ins for the RPC node and the owner's wallet, used by
//! tests and dry runs. The ledger's block height starts at a fixed value and
//! can be made to advance on every query to simulate blockhash expiry.

use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::sweep::traits::{
    Ledger, LedgerError, LedgerResult, RecentBlockhash, SendOptions, SignatureState, SignerError,
    SweepSigner, TokenAccountBalance,
};

/// Block height a fresh ledger starts at
pub const INITIAL_BLOCK_HEIGHT: u64 = 100;

/// Blocks a blockhash stays valid for
pub const BLOCKHASH_VALIDITY_BLOCKS: u64 = 150;

/// In-memory ledger
pub struct MemoryLedger {
    native: RwLock<HashMap<Pubkey, u64>>,
    tokens: RwLock<HashMap<Pubkey, Vec<TokenAccountBalance>>>,
    accounts: RwLock<HashSet<Pubkey>>,
    signatures: RwLock<HashMap<Signature, SignatureState>>,
    blockhash: Hash,
    block_height: AtomicU64,
    blocks_per_poll: AtomicU64,
    existence_checks: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            native: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashSet::new()),
            signatures: RwLock::new(HashMap::new()),
            blockhash: Hash::new_unique(),
            block_height: AtomicU64::new(INITIAL_BLOCK_HEIGHT),
            blocks_per_poll: AtomicU64::new(0),
            existence_checks: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub async fn set_native_balance(&self, owner: Pubkey, lamports: u64) {
        self.native.write().await.insert(owner, lamports);
        self.accounts.write().await.insert(owner);
    }

    /// Add a token account for `owner`; returns its address
    pub async fn add_token_account(
        &self,
        owner: Pubkey,
        mint: Pubkey,
        amount: u64,
        decimals: u8,
    ) -> Pubkey {
        let address = Pubkey::new_unique();
        self.tokens
            .write()
            .await
            .entry(owner)
            .or_default()
            .push(TokenAccountBalance {
                address,
                mint,
                amount,
                decimals,
            });
        self.accounts.write().await.insert(address);
        address
    }

    /// Mark an account as existing
    pub async fn add_account(&self, address: Pubkey) {
        self.accounts.write().await.insert(address);
    }

    /// Make every read fail with an RPC error
    pub async fn fail_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of account existence queries served
    pub async fn existence_checks(&self) -> usize {
        self.existence_checks.load(Ordering::SeqCst)
    }

    /// Blockhash the next built transaction will use
    pub async fn latest_blockhash_now(&self) -> RecentBlockhash {
        self.recent_blockhash()
    }

    pub async fn set_signature_state(&self, signature: Signature, state: SignatureState) {
        self.signatures.write().await.insert(signature, state);
    }

    pub fn current_block_height(&self) -> u64 {
        self.block_height.load(Ordering::SeqCst)
    }

    /// Advance the block height by `blocks` on every height query
    pub fn set_blocks_per_poll(&self, blocks: u64) {
        self.blocks_per_poll.store(blocks, Ordering::SeqCst);
    }

    fn recent_blockhash(&self) -> RecentBlockhash {
        RecentBlockhash {
            blockhash: self.blockhash,
            last_valid_block_height: self.current_block_height() + BLOCKHASH_VALIDITY_BLOCKS,
        }
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        self.check_available()?;
        Ok(self.native.read().await.get(owner).copied().unwrap_or(0))
    }

    async fn token_balances(&self, owner: &Pubkey) -> LedgerResult<Vec<TokenAccountBalance>> {
        self.check_available()?;
        Ok(self.tokens.read().await.get(owner).cloned().unwrap_or_default())
    }

    async fn account_exists(&self, address: &Pubkey) -> LedgerResult<bool> {
        self.check_available()?;
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.read().await.contains(address))
    }

    async fn latest_blockhash(&self) -> LedgerResult<RecentBlockhash> {
        self.check_available()?;
        Ok(self.recent_blockhash())
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        self.check_available()?;
        let step = self.blocks_per_poll.load(Ordering::SeqCst);
        Ok(self.block_height.fetch_add(step, Ordering::SeqCst) + step)
    }

    async fn signature_state(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> LedgerResult<SignatureState> {
        self.check_available()?;
        Ok(self
            .signatures
            .read()
            .await
            .get(signature)
            .cloned()
            .unwrap_or(SignatureState::Pending))
    }
}

/// What the scripted signer does with one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Sign, submit and confirm
    Confirm,
    /// The owner declines
    Reject,
    /// Submission fails before a signature exists
    SubmitError(String),
    /// Lands with an on-chain error
    FailOnChain(String),
    /// Submitted but never seen by the ledger
    NeverLand,
}

/// Signer that follows a script of outcomes, then confirms everything
pub struct ScriptedSigner {
    keypair: Keypair,
    ledger: Arc<MemoryLedger>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    received: Mutex<Vec<Transaction>>,
}

impl ScriptedSigner {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            keypair: Keypair::new(),
            ledger,
            script: Mutex::new(VecDeque::new()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Outcomes for the next transactions, in order
    pub fn with_script(self, outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..self
        }
    }

    /// Every transaction handed to the signer, including declined ones
    pub async fn received(&self) -> Vec<Transaction> {
        self.received.lock().await.clone()
    }

    pub async fn submission_count(&self) -> usize {
        self.received.lock().await.len()
    }

    fn sign(&self, mut tx: Transaction) -> Result<Signature, SignerError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(tx.signatures[0])
    }
}

#[async_trait]
impl SweepSigner for ScriptedSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn send_transaction(
        &self,
        tx: Transaction,
        _options: &SendOptions,
    ) -> Result<Signature, SignerError> {
        self.received.lock().await.push(tx.clone());
        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(ScriptedOutcome::Confirm);

        match outcome {
            ScriptedOutcome::Reject => Err(SignerError::Rejected("User rejected the request".into())),
            ScriptedOutcome::SubmitError(message) => Err(SignerError::Rpc(message)),
            ScriptedOutcome::Confirm => {
                let signature = self.sign(tx)?;
                self.ledger
                    .set_signature_state(signature, SignatureState::Confirmed)
                    .await;
                Ok(signature)
            }
            ScriptedOutcome::FailOnChain(message) => {
                let signature = self.sign(tx)?;
                self.ledger
                    .set_signature_state(signature, SignatureState::Failed(message))
                    .await;
                Ok(signature)
            }
            ScriptedOutcome::NeverLand => self.sign(tx),
        }
    }

    fn signer_type(&self) -> &'static str {
        "scripted"
    }
}
