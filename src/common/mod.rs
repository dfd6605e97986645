//! Common Infrastructure Module
//!
//! Shared utilities and configuration for solsweep.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{
    parse_commitment, ConfigError, ConfirmationSettings, Network, SweepConfig, SweepSettings,
    DEFAULT_DUST_THRESHOLD_LAMPORTS, DEFAULT_NATIVE_RESERVE_LAMPORTS,
};
pub use error::{FailureKind, Result, SweepError};
pub use logging::{
    generate_run_id, init_from_config, init_logging, log_run_finished, log_step_event,
    ErrorDetails, EventCategory, LogEvent, LogLevel, LoggingError,
};
