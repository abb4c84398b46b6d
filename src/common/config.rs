//! Environment-based Configuration for Telepath
//!
//! All settings come from environment variables (a `.env` file is loaded
//! first when present). Signing keys are never part of this struct; they are
//! supplied per spend call.
//!
//! # Environment Variables
//!
//! ## Network
//! - `TELEPATH_NETWORK` - "mainnet", "testnet" or "regtest" (default: "mainnet")
//! - `TELEPATH_EXPLORER_URL` - Ledger-explorer API base (unspent queries)
//! - `TELEPATH_PUSH_URL` - Broadcast endpoint (default: `{explorer}/tx/push`)
//! - `TELEPATH_HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 10)
//!
//! ## Storage
//! - `TELEPATH_RESERVE_DB` - SQLite file for reservations (default: "reserves.db")
//! - `TELEPATH_SEEN_DB` - SQLite file for the seen-address set (default: "seen_addresses.db")
//!
//! ## Monitor
//! - `TELEPATH_BALANCE_REFRESH_SECS` - Balance refresh period (default: 3)
//! - `TELEPATH_ADDRESS_REFRESH_SECS` - Address discovery period (default: 5)
//! - `TELEPATH_DISCOVERY_WINDOW_SECS` - Recency window (default: 86400)
//! - `TELEPATH_BATCH_SIZE` - Addresses per ledger query, 1..=10 (default: 10)
//!
//! ## Spending
//! - `TELEPATH_FIXED_FEE_SATS` - Fee taken from the destination output (default: 20400)
//!
//! ## Logging
//! - `TELEPATH_LOG_LEVEL` - trace, debug, info, warn, error (default: "info")
//! - `TELEPATH_LOG_JSON` - "1" for JSON output

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::sats_to_btc_string;

/// Upper bound on addresses per ledger-query call
pub const MAX_BATCH_SIZE: usize = 10;

/// Fixed network fee in satoshis
pub const DEFAULT_FIXED_FEE_SATS: i64 = 20_400;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "TELEPATH_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Get default ledger-explorer API for this network
    pub fn default_explorer_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "http://btc.blockr.io/api/v1",
            Network::Testnet => "http://tbtc.blockr.io/api/v1",
            Network::Regtest => "http://localhost:3002/api/v1",
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct TelepathConfig {
    /// Network environment
    pub network: Network,

    /// Ledger-explorer API base URL
    pub explorer_url: String,

    /// Broadcast endpoint
    pub push_url: String,

    /// Timeout applied to every outbound request
    pub http_timeout: Duration,

    /// Reservation database path
    pub reserve_db: String,

    /// Seen-address database path
    pub seen_db: String,

    /// Balance refresh period
    pub balance_refresh: Duration,

    /// Address discovery period
    pub address_refresh: Duration,

    /// How far back the discovery query looks
    pub discovery_window: Duration,

    /// Addresses per ledger query
    pub batch_size: usize,

    /// Fixed fee subtracted from the destination output
    pub fixed_fee_sats: i64,

    /// Log level
    pub log_level: String,

    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for TelepathConfig {
    fn default() -> Self {
        let network = Network::Mainnet;
        let explorer_url = network.default_explorer_url().to_string();
        Self {
            network,
            push_url: format!("{}/tx/push", explorer_url),
            explorer_url,
            http_timeout: Duration::from_secs(10),
            reserve_db: "reserves.db".to_string(),
            seen_db: "seen_addresses.db".to_string(),
            balance_refresh: Duration::from_secs(3),
            address_refresh: Duration::from_secs(5),
            discovery_window: Duration::from_secs(24 * 60 * 60),
            batch_size: MAX_BATCH_SIZE,
            fixed_fee_sats: DEFAULT_FIXED_FEE_SATS,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl TelepathConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let network: Network = env::var("TELEPATH_NETWORK")
            .unwrap_or_else(|_| "mainnet".to_string())
            .parse()?;

        let explorer_url = env::var("TELEPATH_EXPLORER_URL")
            .unwrap_or_else(|_| network.default_explorer_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let push_url =
            env::var("TELEPATH_PUSH_URL").unwrap_or_else(|_| format!("{}/tx/push", explorer_url));

        let batch_size = parse_or("TELEPATH_BATCH_SIZE", MAX_BATCH_SIZE)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue(
                "TELEPATH_BATCH_SIZE".to_string(),
                format!("must be between 1 and {}", MAX_BATCH_SIZE),
            ));
        }

        let fixed_fee_sats = parse_or("TELEPATH_FIXED_FEE_SATS", DEFAULT_FIXED_FEE_SATS)?;
        if fixed_fee_sats < 0 {
            return Err(ConfigError::InvalidValue(
                "TELEPATH_FIXED_FEE_SATS".to_string(),
                "fee cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            network,
            explorer_url,
            push_url,
            http_timeout: Duration::from_secs(parse_or("TELEPATH_HTTP_TIMEOUT_SECS", 10)?),
            reserve_db: env::var("TELEPATH_RESERVE_DB")
                .unwrap_or_else(|_| "reserves.db".to_string()),
            seen_db: env::var("TELEPATH_SEEN_DB")
                .unwrap_or_else(|_| "seen_addresses.db".to_string()),
            balance_refresh: parse_period("TELEPATH_BALANCE_REFRESH_SECS", 3)?,
            address_refresh: parse_period("TELEPATH_ADDRESS_REFRESH_SECS", 5)?,
            discovery_window: Duration::from_secs(parse_or(
                "TELEPATH_DISCOVERY_WINDOW_SECS",
                24 * 60 * 60,
            )?),
            batch_size,
            fixed_fee_sats,
            log_level: env::var("TELEPATH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("TELEPATH_LOG_JSON").map(|v| v == "1").unwrap_or(false),
        })
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== Telepath Configuration ===");
        println!("Network: {:?}", self.network);
        println!("Explorer: {}", self.explorer_url);
        println!("Push endpoint: {}", self.push_url);
        println!("Reserve DB: {}", self.reserve_db);
        println!("Seen-address DB: {}", self.seen_db);
        println!(
            "Refresh: balances every {}s, addresses every {}s",
            self.balance_refresh.as_secs(),
            self.address_refresh.as_secs()
        );
        println!("Batch size: {}", self.batch_size);
        println!(
            "Fixed fee: {} sats ({} BTC)",
            self.fixed_fee_sats,
            sats_to_btc_string(self.fixed_fee_sats)
        );
        println!("Log Level: {}", self.log_level);
        println!("==============================");
    }
}

/// Parse an optional numeric env var, falling back to `default` when unset
fn parse_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(var_name.to_string(), format!("not a number: {}", value))
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a refresh period in seconds; zero is rejected
fn parse_period(var_name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(var_name, default_secs)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            var_name.to_string(),
            "period must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
