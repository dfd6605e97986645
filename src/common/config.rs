//! Environment-based Configuration for solsweep
//!
//! Configuration is loaded from environment variables, optionally seeded from a
//! `.env` file. Keys never live in the environment itself; only the path to the
//! owner's keypair file does.
//!
//! # Environment Variables
//!
//! ## Network Configuration
//! - `SOLSWEEP_NETWORK` - "mainnet", "testnet", or "devnet" (default: "devnet")
//! - `SOLSWEEP_RPC_URL` - Solana RPC endpoint URL (default: per network)
//! - `SOLSWEEP_COMMITMENT` - "processed", "confirmed" or "finalized" (default: "confirmed")
//!
//! ## Sweep Configuration
//! - `SOLSWEEP_DESTINATION` - Destination account (required)
//! - `SOLSWEEP_KEYPAIR` - Path to the owner's keypair JSON file
//! - `SOLSWEEP_RESERVE_LAMPORTS` - Native balance kept for fees (default: 1000000)
//! - `SOLSWEEP_RESERVE_SOL` - Same, as a decimal SOL amount; ignored if the above is set
//! - `SOLSWEEP_DUST_LAMPORTS` - Native amounts at or below this are skipped (default: 10000)
//! - `SOLSWEEP_BATCH_SIZE` - Token transfers per transaction, 1-5 (default: 5)
//! - `SOLSWEEP_BATCH_DELAY_MS` - Pause between submissions (default: 1000)
//! - `SOLSWEEP_CONFIRM_POLL_MS` - Signature status poll interval (default: 500)
//! - `SOLSWEEP_CONFIRM_TIMEOUT_SECS` - Hard cap on one confirmation wait (default: 90)
//!
//! ## Optional Settings
//! - `SOLSWEEP_SOL_PRICE_USD` - Price used to rank the native balance (default: 150)
//! - `SOLSWEEP_TOKEN_UNIT_PRICE_USD` - Price per token unit used for ranking (default: 1)
//! - `SOLSWEEP_NOTIFY_URL` - Webhook base URL for lifecycle events
//! - `SOLSWEEP_LOG_LEVEL` - Logging level (debug, info, warn, error)

use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::{parse_sol, MAX_BATCH_SIZE};

/// Default native reserve: 0.001 SOL for rent exemption and fees
pub const DEFAULT_NATIVE_RESERVE_LAMPORTS: u64 = 1_000_000;

/// Default dust threshold: 0.00001 SOL
pub const DEFAULT_DUST_THRESHOLD_LAMPORTS: u64 = 10_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("destination must differ from the swept account")]
    DestinationIsOwner,
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "mainnet-beta" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidValue(
                "SOLSWEEP_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Get default Solana RPC for this network
    pub fn default_rpc(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }
}

/// Parse a commitment level name
pub fn parse_commitment(s: &str) -> Result<CommitmentConfig, ConfigError> {
    match s.to_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        _ => Err(ConfigError::InvalidValue(
            "SOLSWEEP_COMMITMENT".to_string(),
            format!("unknown commitment: {}", s),
        )),
    }
}

/// Confirmation wait settings
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationSettings {
    /// Commitment the signature must reach
    pub commitment: CommitmentConfig,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Hard cap on a single wait, on top of blockhash expiry
    pub max_wait: Duration,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::confirmed(),
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(90),
        }
    }
}

/// Parameters of one sweep, independent of how the collaborators are wired
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Account that receives every swept asset
    pub destination: Pubkey,
    /// Lamports left behind on the swept account
    pub native_reserve_lamports: u64,
    /// Native amounts at or below this (after reserve) are not swept
    pub dust_threshold_lamports: u64,
    /// Token transfers per transaction
    pub batch_size: usize,
    /// Pause between submissions
    pub inter_batch_delay: Duration,
    /// Confirmation wait
    pub confirmation: ConfirmationSettings,
}

impl SweepSettings {
    /// Defaults for a destination
    pub fn new(destination: Pubkey) -> Self {
        Self {
            destination,
            native_reserve_lamports: DEFAULT_NATIVE_RESERVE_LAMPORTS,
            dust_threshold_lamports: DEFAULT_DUST_THRESHOLD_LAMPORTS,
            batch_size: MAX_BATCH_SIZE,
            inter_batch_delay: Duration::from_millis(1000),
            confirmation: ConfirmationSettings::default(),
        }
    }

    /// Check the settings against the account being swept
    pub fn validate(&self, owner: &Pubkey) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue(
                "SOLSWEEP_BATCH_SIZE".to_string(),
                format!("must be between 1 and {}", MAX_BATCH_SIZE),
            ));
        }

        if &self.destination == owner {
            return Err(ConfigError::DestinationIsOwner);
        }

        if self.confirmation.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SOLSWEEP_CONFIRM_POLL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Network environment
    pub network: Network,

    /// Solana RPC endpoint
    pub rpc_url: String,

    /// Path to the owner's keypair file
    pub keypair_path: String,

    /// Sweep parameters
    pub sweep: SweepSettings,

    /// Price per SOL used for ranking
    pub sol_price_usd: f64,

    /// Price per token unit used for ranking
    pub token_unit_price_usd: f64,

    /// Webhook base URL for notifications
    pub notify_url: Option<String>,

    /// Log level
    pub log_level: String,
}

impl SweepConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = lookup("SOLSWEEP_NETWORK")
            .unwrap_or_else(|| "devnet".to_string())
            .parse()?;

        let rpc_url =
            lookup("SOLSWEEP_RPC_URL").unwrap_or_else(|| network.default_rpc().to_string());

        let commitment = match lookup("SOLSWEEP_COMMITMENT") {
            Some(value) => parse_commitment(&value)?,
            None => CommitmentConfig::confirmed(),
        };

        let destination = lookup("SOLSWEEP_DESTINATION")
            .ok_or_else(|| ConfigError::MissingEnvVar("SOLSWEEP_DESTINATION".to_string()))?;
        let destination = Pubkey::from_str(destination.trim()).map_err(|e| {
            ConfigError::InvalidValue("SOLSWEEP_DESTINATION".to_string(), e.to_string())
        })?;

        let keypair_path = lookup("SOLSWEEP_KEYPAIR").unwrap_or_else(default_keypair_path);

        let mut sweep = SweepSettings::new(destination);
        sweep.confirmation.commitment = commitment;

        if let Some(v) = parse_var(&lookup, "SOLSWEEP_RESERVE_LAMPORTS")? {
            sweep.native_reserve_lamports = v;
        } else if let Some(raw) = lookup("SOLSWEEP_RESERVE_SOL") {
            sweep.native_reserve_lamports = parse_sol(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("SOLSWEEP_RESERVE_SOL".to_string(), raw.clone())
            })?;
        }
        if let Some(v) = parse_var(&lookup, "SOLSWEEP_DUST_LAMPORTS")? {
            sweep.dust_threshold_lamports = v;
        }
        if let Some(v) = parse_var(&lookup, "SOLSWEEP_BATCH_SIZE")? {
            sweep.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "SOLSWEEP_BATCH_DELAY_MS")? {
            sweep.inter_batch_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "SOLSWEEP_CONFIRM_POLL_MS")? {
            sweep.confirmation.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "SOLSWEEP_CONFIRM_TIMEOUT_SECS")? {
            sweep.confirmation.max_wait = Duration::from_secs(v);
        }

        let sol_price_usd = parse_var(&lookup, "SOLSWEEP_SOL_PRICE_USD")?.unwrap_or(150.0);
        let token_unit_price_usd =
            parse_var(&lookup, "SOLSWEEP_TOKEN_UNIT_PRICE_USD")?.unwrap_or(1.0);

        let notify_url = lookup("SOLSWEEP_NOTIFY_URL").filter(|url| !url.trim().is_empty());
        let log_level = lookup("SOLSWEEP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            network,
            rpc_url,
            keypair_path,
            sweep,
            sol_price_usd,
            token_unit_price_usd,
            notify_url,
            log_level,
        })
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== solsweep Configuration ===");
        println!("Network: {:?}", self.network);
        println!("RPC: {}", self.rpc_url);
        println!("Commitment: {:?}", self.sweep.confirmation.commitment.commitment);
        println!("Destination: {}", self.sweep.destination);
        println!("Keypair: {}", self.keypair_path);
        println!("Reserve: {} lamports", self.sweep.native_reserve_lamports);
        println!("Batch Size: {}", self.sweep.batch_size);
        println!(
            "Notifications: {}",
            self.notify_url.as_deref().unwrap_or("log only")
        );
        println!("Log Level: {}", self.log_level);
        println!("==============================");
    }
}

/// Parse an optional numeric variable
fn parse_var<F, T>(lookup: &F, var_name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var_name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue(var_name.to_string(), e.to_string())),
        None => Ok(None),
    }
}

fn default_keypair_path() -> String {
    match std::env::var("HOME") {
        Ok(home) => format!("{}/.config/solana/id.json", home),
        Err(_) => "id.json".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_network_parsing() {
        assert!(matches!("mainnet".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("mainnet-beta".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("testnet".parse::<Network>(), Ok(Network::Testnet)));
        assert!(matches!("devnet".parse::<Network>(), Ok(Network::Devnet)));
        assert!("invalid".parse::<Network>().is_err());
    }

    #[test]
    fn test_destination_required() {
        let result = SweepConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_defaults() {
        let destination = Pubkey::new_unique();
        let config = SweepConfig::from_lookup(lookup_from(&[(
            "SOLSWEEP_DESTINATION",
            &destination.to_string(),
        )]))
        .unwrap();

        assert_eq!(config.network, Network::Devnet);
        assert_eq!(config.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.sweep.destination, destination);
        assert_eq!(config.sweep.batch_size, 5);
        assert_eq!(config.sweep.native_reserve_lamports, 1_000_000);
        assert_eq!(config.sweep.confirmation.commitment, CommitmentConfig::confirmed());
        assert!(config.notify_url.is_none());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let destination = Pubkey::new_unique().to_string();
        let config = SweepConfig::from_lookup(lookup_from(&[
            ("SOLSWEEP_DESTINATION", &destination),
            ("SOLSWEEP_NETWORK", "mainnet"),
            ("SOLSWEEP_COMMITMENT", "finalized"),
            ("SOLSWEEP_BATCH_SIZE", "3"),
            ("SOLSWEEP_BATCH_DELAY_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.sweep.batch_size, 3);
        assert!(config.sweep.inter_batch_delay.is_zero());

        let reserve = SweepConfig::from_lookup(lookup_from(&[
            ("SOLSWEEP_DESTINATION", &destination),
            ("SOLSWEEP_RESERVE_SOL", "0.002"),
        ]))
        .unwrap();
        assert_eq!(reserve.sweep.native_reserve_lamports, 2_000_000);
        assert_eq!(config.sweep.confirmation.commitment, CommitmentConfig::finalized());

        let bad = SweepConfig::from_lookup(lookup_from(&[
            ("SOLSWEEP_DESTINATION", &destination),
            ("SOLSWEEP_BATCH_SIZE", "five"),
        ]));
        assert!(matches!(bad, Err(ConfigError::InvalidValue(_, _))));
    }

    #[test]
    fn test_settings_validation() {
        let owner = Pubkey::new_unique();
        let mut settings = SweepSettings::new(Pubkey::new_unique());
        assert!(settings.validate(&owner).is_ok());

        settings.batch_size = 6;
        assert!(settings.validate(&owner).is_err());

        settings.batch_size = 5;
        settings.destination = owner;
        assert!(matches!(
            settings.validate(&owner),
            Err(ConfigError::DestinationIsOwner)
        ));
    }
}
