//! Common Error Types for Telepath
//!
//! Every component surfaces failures as a `WalletError`. Nothing in the core
//! treats an error as process-fatal: the monitor drops a refresh cycle, the
//! spend path leaves the reservation unspent.

use thiserror::Error;

/// Root error type for the wallet core
#[derive(Debug, Error)]
pub enum WalletError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Caller input rejected (e.g. non-positive amount)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown address or reservation
    #[error("not found: {0}")]
    NotFound(String),

    /// Reservation has already been spent
    #[error("reservation already spent: {0}")]
    AlreadySpent(String),

    /// Not enough confirmed funds
    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: i64, available: i64 },

    /// Reservation amount does not cover the fixed network fee
    #[error("fee exceeds amount: amount {amount} sats, fee {fee} sats")]
    FeeExceedsAmount { amount: i64, fee: i64 },

    /// Address could not be decoded for the configured network
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Ledger-query or broadcast transport failure, or a malformed response
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Broadcast endpoint explicitly refused the transaction
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Signing errors
    #[error("signing error: {0}")]
    Signing(String),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Broadcast went through but the ledger could not record the spend
    #[error("transaction {txid} broadcast but reservation not committed: {reason}")]
    CommitFailed { txid: String, reason: String },
}

impl WalletError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a signing error
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Check if the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::UpstreamUnavailable(_)
                | WalletError::BroadcastRejected(_)
                | WalletError::Storage(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::Config(_) => "CONFIG_ERROR",
            WalletError::Logging(_) => "LOGGING_ERROR",
            WalletError::Validation(_) => "VALIDATION_ERROR",
            WalletError::NotFound(_) => "NOT_FOUND",
            WalletError::AlreadySpent(_) => "ALREADY_SPENT",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::FeeExceedsAmount { .. } => "FEE_EXCEEDS_AMOUNT",
            WalletError::InvalidAddress(_) => "INVALID_ADDRESS",
            WalletError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            WalletError::BroadcastRejected(_) => "BROADCAST_REJECTED",
            WalletError::Signing(_) => "SIGNING_ERROR",
            WalletError::Storage(_) => "STORAGE_ERROR",
            WalletError::CommitFailed { .. } => "COMMIT_FAILED",
        }
    }
}

/// Result type alias using WalletError
pub type Result<T> = std::result::Result<T, WalletError>;
