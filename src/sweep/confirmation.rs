//! Confirmation Waiter
//!
//! Polls a submitted signature until it reaches the required commitment.
//! The wait is bounded by the blockhash expiry window: once the ledger's block
//! height passes the transaction's last valid block height the signature can
//! no longer land, and the wait fails instead of hanging. A hard time cap
//! applies on top. Retrying is the scheduler's decision, never made here.

use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::traits::{Ledger, LedgerError, SignatureState};
use crate::common::config::ConfirmationSettings;

/// Confirmation errors
#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("status query failed: {0}")]
    Rpc(#[from] LedgerError),

    #[error("transaction failed on-chain: {0}")]
    TransactionFailed(String),

    #[error("blockhash expired at block height {current_block_height} (last valid {last_valid_block_height})")]
    BlockhashExpired {
        last_valid_block_height: u64,
        current_block_height: u64,
    },

    #[error("not confirmed within {0:?}")]
    Timeout(Duration),
}

/// Waits for submitted signatures
pub struct ConfirmationWaiter {
    ledger: Arc<dyn Ledger>,
    settings: ConfirmationSettings,
}

impl ConfirmationWaiter {
    pub fn new(ledger: Arc<dyn Ledger>, settings: ConfirmationSettings) -> Self {
        Self { ledger, settings }
    }

    /// Wait until `signature` reaches the configured commitment
    pub async fn wait(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
    ) -> Result<(), ConfirmationError> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;

            if self.check(signature).await? {
                tracing::debug!(
                    target: "solsweep::confirmation",
                    signature = %signature,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Signature confirmed"
                );
                return Ok(());
            }

            let current_block_height = self.ledger.block_height().await?;
            if current_block_height > last_valid_block_height {
                // It may have landed in the last valid block
                if self.check(signature).await? {
                    return Ok(());
                }

                return Err(ConfirmationError::BlockhashExpired {
                    last_valid_block_height,
                    current_block_height,
                });
            }

            if started.elapsed() >= self.settings.max_wait {
                return Err(ConfirmationError::Timeout(self.settings.max_wait));
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn check(&self, signature: &Signature) -> Result<bool, ConfirmationError> {
        match self
            .ledger
            .signature_state(signature, self.settings.commitment)
            .await?
        {
            SignatureState::Confirmed => Ok(true),
            SignatureState::Failed(err) => Err(ConfirmationError::TransactionFailed(err)),
            SignatureState::Pending => Ok(false),
        }
    }
}
