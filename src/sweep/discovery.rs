//! Balance Discovery
//!
//! Enumerates the swept account's holdings: the native balance minus the fee
//! reserve, plus every non-empty SPL token account at full balance. Results are
//! ranked by estimated value, highest first. Splitting native from fungible for
//! batching happens in the scheduler.

use solana_sdk::pubkey::Pubkey;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::traits::{Ledger, LedgerError};
use crate::common::config::SweepSettings;
use crate::types::{lamports_to_sol, raw_to_ui, AssetHolding};

/// Prices holdings for ranking
pub trait ValueEstimator: Send + Sync {
    /// Value of a native amount
    fn native_value(&self, lamports: u64) -> f64;

    /// Value of a token amount
    fn token_value(&self, mint: &Pubkey, amount: u64, decimals: u8) -> f64;
}

/// Fixed prices: one for SOL, a default per token unit, optional per-mint overrides
#[derive(Debug, Clone)]
pub struct StaticPriceEstimator {
    pub sol_price: f64,
    pub token_unit_price: f64,
    pub mint_prices: HashMap<Pubkey, f64>,
}

impl StaticPriceEstimator {
    pub fn new(sol_price: f64, token_unit_price: f64) -> Self {
        Self {
            sol_price,
            token_unit_price,
            mint_prices: HashMap::new(),
        }
    }

    /// Override the unit price of one mint
    pub fn with_mint_price(mut self, mint: Pubkey, price: f64) -> Self {
        self.mint_prices.insert(mint, price);
        self
    }
}

impl Default for StaticPriceEstimator {
    fn default() -> Self {
        Self::new(150.0, 1.0)
    }
}

impl ValueEstimator for StaticPriceEstimator {
    fn native_value(&self, lamports: u64) -> f64 {
        lamports_to_sol(lamports) * self.sol_price
    }

    fn token_value(&self, mint: &Pubkey, amount: u64, decimals: u8) -> f64 {
        let price = self
            .mint_prices
            .get(mint)
            .copied()
            .unwrap_or(self.token_unit_price);
        raw_to_ui(amount, decimals) * price
    }
}

/// Holdings found by one discovery call
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Holdings ranked by estimated value, highest first
    pub holdings: Vec<AssetHolding>,
    /// Set when the ledger read failed and the snapshot is empty for that reason
    pub degraded: bool,
}

impl DiscoveryResult {
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// Native amount left to sweep after keeping `reserve`, if above `dust_threshold`
pub fn sweepable_native(balance: u64, reserve: u64, dust_threshold: u64) -> Option<u64> {
    let sendable = balance.saturating_sub(reserve);
    (sendable > dust_threshold).then_some(sendable)
}

/// Discover every sweepable holding of `owner`
///
/// A ledger failure is not propagated: it yields an empty, degraded result so
/// the run simply has nothing to sweep.
pub async fn discover_holdings(
    ledger: &dyn Ledger,
    owner: &Pubkey,
    settings: &SweepSettings,
    estimator: &dyn ValueEstimator,
) -> DiscoveryResult {
    match read_holdings(ledger, owner, settings, estimator).await {
        Ok(holdings) => {
            tracing::info!(
                target: "solsweep::discovery",
                owner = %owner,
                holdings = holdings.len(),
                "Discovery complete"
            );
            DiscoveryResult {
                holdings,
                degraded: false,
            }
        }
        Err(e) => {
            tracing::warn!(
                target: "solsweep::discovery",
                owner = %owner,
                error = %e,
                "Failed to fetch balances, nothing to sweep"
            );
            DiscoveryResult {
                holdings: Vec::new(),
                degraded: true,
            }
        }
    }
}

async fn read_holdings(
    ledger: &dyn Ledger,
    owner: &Pubkey,
    settings: &SweepSettings,
    estimator: &dyn ValueEstimator,
) -> Result<Vec<AssetHolding>, LedgerError> {
    let mut holdings = Vec::new();

    let balance = ledger.native_balance(owner).await?;
    match sweepable_native(
        balance,
        settings.native_reserve_lamports,
        settings.dust_threshold_lamports,
    ) {
        Some(lamports) => {
            holdings.push(AssetHolding::native(
                *owner,
                lamports,
                estimator.native_value(lamports),
            ));
        }
        None => {
            tracing::debug!(
                target: "solsweep::discovery",
                balance,
                reserve = settings.native_reserve_lamports,
                "Native balance below reserve, skipping"
            );
        }
    }

    for account in ledger.token_balances(owner).await? {
        if account.amount == 0 {
            continue;
        }

        holdings.push(AssetHolding::fungible(
            account.mint,
            account.address,
            account.amount,
            account.decimals,
            estimator.token_value(&account.mint, account.amount, account.decimals),
        ));
    }

    // Stable: equal values keep ledger order
    holdings.sort_by(|a, b| {
        b.estimated_value
            .partial_cmp(&a.estimated_value)
            .unwrap_or(Ordering::Equal)
    });

    Ok(holdings)
}
