//! Inbound Data Contracts
//!
//! Request/response bodies for the balance, reserve and spend operations.
//! Routing lives outside this crate; these types are what it serializes.

use serde::{Deserialize, Serialize};

use crate::common::WalletError;

/// Balance of an address net of open reservations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    /// Confirmed balance minus `reserved`
    pub available_to_spend: i64,
    /// Sum of unspent reservations
    pub reserved: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub reservation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub destination_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendResponse {
    pub transaction_identifier: String,
}

/// Error body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&WalletError> for ErrorResponse {
    fn from(err: &WalletError) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
