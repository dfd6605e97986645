//! Solana RPC Ledger
//!
//! `Ledger` backed by the nonblocking `solana-client` RPC client. Token
//! accounts come back as `jsonParsed` payloads and are decoded into typed
//! structs here; malformed entries are skipped with a warning.

use async_trait::async_trait;
use serde::Deserialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;

use crate::common::config::SweepConfig;
use crate::sweep::traits::{
    Ledger, LedgerError, LedgerResult, RecentBlockhash, SignatureState, TokenAccountBalance,
};

// ============================================================================
// Constants
// ============================================================================

/// Solana devnet RPC endpoint
pub const DEVNET_RPC: &str = "https://api.devnet.solana.com";

// ============================================================================
// Parsed Token Accounts
// ============================================================================

#[derive(Debug, Deserialize)]
struct ParsedAccountData {
    parsed: ParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedTokenAccount {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    mint: String,
    token_amount: RawTokenAmount,
}

#[derive(Debug, Deserialize)]
struct RawTokenAmount {
    amount: String,
    decimals: u8,
}

/// Decode one `jsonParsed` token account
pub fn parse_token_account(address: &str, data: serde_json::Value) -> LedgerResult<TokenAccountBalance> {
    let parsed: ParsedAccountData =
        serde_json::from_value(data).map_err(|e| LedgerError::InvalidData(e.to_string()))?;
    let info = parsed.parsed.info;

    let address =
        Pubkey::from_str(address).map_err(|e| LedgerError::InvalidData(e.to_string()))?;
    let mint =
        Pubkey::from_str(&info.mint).map_err(|e| LedgerError::InvalidData(e.to_string()))?;
    let amount = info
        .token_amount
        .amount
        .parse::<u64>()
        .map_err(|e| LedgerError::InvalidData(format!("token amount: {}", e)))?;

    Ok(TokenAccountBalance {
        address,
        mint,
        amount,
        decimals: info.token_amount.decimals,
    })
}

fn rpc_error(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Rpc(e.to_string())
}

// ============================================================================
// Solana Client
// ============================================================================

pub struct SolClient {
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl SolClient {
    /// Create a client reading at `commitment`
    pub fn new(rpc_url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new_with_commitment(rpc_url.into(), commitment)),
            commitment,
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.rpc_url.clone(), config.sweep.confirmation.commitment)
    }

    /// Shared RPC handle, for signers submitting through the same node
    pub fn rpc(&self) -> Arc<RpcClient> {
        self.rpc.clone()
    }
}

#[async_trait]
impl Ledger for SolClient {
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        Ok(self
            .rpc
            .get_balance_with_commitment(owner, self.commitment)
            .await
            .map_err(rpc_error)?
            .value)
    }

    async fn token_balances(&self, owner: &Pubkey) -> LedgerResult<Vec<TokenAccountBalance>> {
        let keyed = self
            .rpc
            .get_token_accounts_by_owner_with_commitment(
                owner,
                TokenAccountsFilter::ProgramId(spl_token::id()),
                self.commitment,
            )
            .await
            .map_err(rpc_error)?
            .value;

        let mut balances = Vec::with_capacity(keyed.len());
        for account in keyed {
            let parsed = serde_json::to_value(&account.account.data)
                .map_err(|e| LedgerError::InvalidData(e.to_string()))
                .and_then(|data| parse_token_account(&account.pubkey, data));

            match parsed {
                Ok(balance) => balances.push(balance),
                Err(e) => {
                    tracing::warn!(
                        target: "solsweep::rpc",
                        account = %account.pubkey,
                        error = %e,
                        "Skipping unreadable token account"
                    );
                }
            }
        }

        Ok(balances)
    }

    async fn account_exists(&self, address: &Pubkey) -> LedgerResult<bool> {
        Ok(self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(rpc_error)?
            .value
            .is_some())
    }

    async fn latest_blockhash(&self) -> LedgerResult<RecentBlockhash> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(rpc_error)?;

        Ok(RecentBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        self.rpc
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(rpc_error)
    }

    async fn signature_state(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> LedgerResult<SignatureState> {
        let statuses = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(rpc_error)?
            .value;

        let state = match statuses.into_iter().next().flatten() {
            None => SignatureState::Pending,
            Some(status) => match status.err {
                Some(err) => SignatureState::Failed(err.to_string()),
                None if status.satisfies_commitment(commitment) => SignatureState::Confirmed,
                None => SignatureState::Pending,
            },
        };

        Ok(state)
    }
}
