//! Asset Holding Types
//!
//! A holding is one sweepable balance discovered on the owner's account:
//! the native SOL balance (reserve already deducted) or one SPL token account.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use super::units::{format_amount, NATIVE_DECIMALS};

/// Reserved identifier for the native holding
pub const NATIVE_IDENTIFIER: &str = "SOL";

/// Maximum number of fungible holdings in one transaction
pub const MAX_BATCH_SIZE: usize = 5;

/// Kind of asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Native SOL balance
    Native,
    /// SPL token balance
    Fungible,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "SOL"),
            Self::Fungible => write!(f, "SPL"),
        }
    }
}

/// One sweepable balance
#[derive(Debug, Clone, PartialEq)]
pub struct AssetHolding {
    /// Native or fungible
    pub kind: AssetKind,
    /// `NATIVE_IDENTIFIER` for native, mint address otherwise
    pub identifier: String,
    /// Mint (None for native)
    pub mint: Option<Pubkey>,
    /// Account the balance lives in (owner for native, token account otherwise)
    pub source_account: Pubkey,
    /// Disposable amount in base units
    pub amount: u64,
    /// Decimal precision of `amount`
    pub decimals: u8,
    /// Display symbol
    pub symbol: String,
    /// Estimated value, used for ordering and display only
    pub estimated_value: f64,
}

impl AssetHolding {
    /// Create the native holding
    pub fn native(owner: Pubkey, lamports: u64, estimated_value: f64) -> Self {
        Self {
            kind: AssetKind::Native,
            identifier: NATIVE_IDENTIFIER.to_string(),
            mint: None,
            source_account: owner,
            amount: lamports,
            decimals: NATIVE_DECIMALS,
            symbol: NATIVE_IDENTIFIER.to_string(),
            estimated_value,
        }
    }

    /// Create a fungible holding for one token account
    pub fn fungible(
        mint: Pubkey,
        token_account: Pubkey,
        amount: u64,
        decimals: u8,
        estimated_value: f64,
    ) -> Self {
        let identifier = mint.to_string();
        let symbol = identifier.chars().take(8).collect();

        Self {
            kind: AssetKind::Fungible,
            identifier,
            mint: Some(mint),
            source_account: token_account,
            amount,
            decimals,
            symbol,
            estimated_value,
        }
    }

    pub fn is_native(&self) -> bool {
        self.kind == AssetKind::Native
    }

    /// Amount as an exact decimal string
    pub fn ui_amount(&self) -> String {
        format_amount(self.amount, self.decimals)
    }
}

impl std::fmt::Display for AssetHolding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, ~${:.2})",
            self.ui_amount(),
            self.symbol,
            self.kind,
            self.estimated_value
        )
    }
}

/// An ordered group of fungible holdings submitted in one transaction
#[derive(Debug, Clone)]
pub struct TransferBatch {
    /// Position of this batch in the run
    pub number: usize,
    /// Holdings in discovery order
    pub holdings: Vec<AssetHolding>,
    /// Indices of the holdings' records in the run's record list
    pub record_indices: Vec<usize>,
}

impl TransferBatch {
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// Execution order for one sweep
#[derive(Debug, Clone, Default)]
pub struct SweepPlan {
    /// Fungible batches in execution order
    pub batches: Vec<TransferBatch>,
    /// Native transfer step with its record index, always last
    pub native: Option<(usize, AssetHolding)>,
}

impl SweepPlan {
    /// Total number of submissions this plan performs
    pub fn step_count(&self) -> usize {
        self.batches.len() + usize::from(self.native.is_some())
    }

    /// Holdings in record order (fungible batches, then native)
    pub fn holdings(&self) -> Vec<&AssetHolding> {
        self.batches
            .iter()
            .flat_map(|b| b.holdings.iter())
            .chain(self.native.iter().map(|(_, h)| h))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.step_count() == 0
    }
}
