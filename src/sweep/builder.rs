//! Transaction Builder
//!
//! Builds the instructions that move one holding to the destination:
//! an optional associated-token-account creation followed by a checked
//! transfer of the full raw amount, or a single system transfer for SOL.
//!
//! # Destination account creation
//!
//! Whether the destination token account exists is checked immediately before
//! building. The creation instruction is the idempotent variant, so an account
//! created by someone else between the check and submission does not fail the
//! batch. Within one transaction a destination account is only created once.

use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::traits::{Ledger, LedgerError};
use crate::types::{AssetHolding, TransferBatch};

/// Builder errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("insufficient native balance: {balance} lamports with {reserve} reserved")]
    InsufficientFunds { balance: u64, reserve: u64 },

    #[error("invalid holding: {0}")]
    InvalidHolding(String),

    #[error("instruction error: {0}")]
    Instruction(String),

    #[error("batch has no holdings")]
    EmptyBatch,
}

/// Instructions for one fungible holding
#[derive(Debug, Clone)]
pub struct HoldingInstructions {
    /// Destination token account
    pub destination_account: Pubkey,
    /// Whether a creation instruction was included
    pub creates_destination_account: bool,
    /// Creation (optional) then transfer
    pub instructions: Vec<Instruction>,
}

/// An unsigned transaction ready for the signer
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    /// Block height after which the transaction's blockhash is expired
    pub last_valid_block_height: u64,
    /// Destination token accounts this transaction creates
    pub created_accounts: Vec<Pubkey>,
}

/// Native transfer transaction with the amount it moves
#[derive(Debug, Clone)]
pub struct BuiltNativeTransfer {
    pub built: BuiltTransaction,
    pub lamports: u64,
}

/// Builds sweep transactions for one payer/destination pair
pub struct TransactionBuilder {
    ledger: Arc<dyn Ledger>,
    /// Swept account; signs, pays fees and funds account rent
    payer: Pubkey,
    /// Receiving account
    destination: Pubkey,
}

impl TransactionBuilder {
    pub fn new(ledger: Arc<dyn Ledger>, payer: Pubkey, destination: Pubkey) -> Self {
        Self {
            ledger,
            payer,
            destination,
        }
    }

    /// Destination's associated token account for `mint`
    pub fn destination_token_account(&self, mint: &Pubkey) -> Pubkey {
        get_associated_token_address(&self.destination, mint)
    }

    /// Instructions moving one fungible holding
    ///
    /// `planned` holds destination accounts already being created by the
    /// transaction under construction; they are not checked again.
    pub async fn token_transfer_instructions(
        &self,
        holding: &AssetHolding,
        planned: &mut HashSet<Pubkey>,
    ) -> Result<HoldingInstructions, BuildError> {
        let mint = match (holding.is_native(), holding.mint) {
            (false, Some(mint)) => mint,
            _ => {
                return Err(BuildError::InvalidHolding(format!(
                    "{} is not a token holding",
                    holding.identifier
                )))
            }
        };

        let destination_account = self.destination_token_account(&mint);
        let mut instructions = Vec::with_capacity(2);

        let creates_destination_account = if planned.contains(&destination_account) {
            false
        } else {
            !self.ledger.account_exists(&destination_account).await?
        };

        if creates_destination_account {
            planned.insert(destination_account);
            instructions.push(create_associated_token_account_idempotent(
                &self.payer,
                &self.destination,
                &mint,
                &spl_token::id(),
            ));
        }

        let transfer = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &holding.source_account,
            &mint,
            &destination_account,
            &self.payer,
            &[],
            holding.amount,
            holding.decimals,
        )
        .map_err(|e| BuildError::Instruction(e.to_string()))?;
        instructions.push(transfer);

        Ok(HoldingInstructions {
            destination_account,
            creates_destination_account,
            instructions,
        })
    }

    /// System transfer of `lamports` to the destination
    pub fn native_transfer_instruction(&self, lamports: u64) -> Instruction {
        system_instruction::transfer(&self.payer, &self.destination, lamports)
    }

    /// One transaction carrying every holding of the batch
    pub async fn build_batch(&self, batch: &TransferBatch) -> Result<BuiltTransaction, BuildError> {
        if batch.is_empty() {
            return Err(BuildError::EmptyBatch);
        }

        let mut planned = HashSet::new();
        let mut instructions = Vec::with_capacity(batch.len() * 2);
        let mut created_accounts = Vec::new();

        for holding in &batch.holdings {
            let built = self.token_transfer_instructions(holding, &mut planned).await?;
            if built.creates_destination_account {
                created_accounts.push(built.destination_account);
            }
            instructions.extend(built.instructions);
        }

        let mut built = self.finalize(&instructions).await?;
        built.created_accounts = created_accounts;
        Ok(built)
    }

    /// Native transfer of the current balance minus `reserve`
    ///
    /// The balance is read again here because earlier batches spend fees and
    /// account rent from it.
    pub async fn build_native(&self, reserve: u64) -> Result<BuiltNativeTransfer, BuildError> {
        let balance = self.ledger.native_balance(&self.payer).await?;
        let lamports = balance.saturating_sub(reserve);

        if lamports == 0 {
            return Err(BuildError::InsufficientFunds { balance, reserve });
        }

        tracing::debug!(
            target: "solsweep::builder",
            balance,
            lamports,
            reserve,
            "Building native transfer"
        );

        let instruction = self.native_transfer_instruction(lamports);
        let built = self.finalize(&[instruction]).await?;

        Ok(BuiltNativeTransfer { built, lamports })
    }

    async fn finalize(&self, instructions: &[Instruction]) -> Result<BuiltTransaction, BuildError> {
        let recent = self.ledger.latest_blockhash().await?;
        let message = Message::new_with_blockhash(instructions, Some(&self.payer), &recent.blockhash);

        Ok(BuiltTransaction {
            transaction: Transaction::new_unsigned(message),
            last_valid_block_height: recent.last_valid_block_height,
            created_accounts: Vec::new(),
        })
    }
}
