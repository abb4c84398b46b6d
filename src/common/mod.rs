//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the wallet core.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Network, TelepathConfig};
pub use error::{Result, WalletError};
pub use logging::{
    init_from_config, init_logging, log_refresh_event,
    log_reservation_event, log_spend_event, EventCategory, LogEvent, LogLevel, LoggingError,
};
