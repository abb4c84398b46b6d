//! Ledger-Explorer API Client
//!
//! Talks to a blockr-style explorer: batched unspent-output queries and raw
//! transaction pushes. The monitor and the transaction manager depend on the
//! `LedgerQuery` and `Broadcaster` traits rather than on this client, so
//! tests can substitute fakes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::common::{Network, TelepathConfig, WalletError};

/// Status string the explorer uses for a successful call
pub const STATUS_SUCCESS: &str = "success";

/// Batched unspent-output lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Fetch unspent outputs for up to ten addresses in one call
    async fn unspent(&self, addresses: &[String]) -> Result<Vec<AddressUnspent>, ExplorerError>;
}

/// Raw transaction submission
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Push a hex-encoded signed transaction; returns the explorer's reference on success
    async fn broadcast(&self, tx_hex: &str) -> Result<String, ExplorerError>;
}

/// Explorer HTTP client
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    client: Client,
    base_url: String,
    push_url: String,
}

impl ExplorerClient {
    /// Create a new client with custom URLs
    pub fn new(base_url: &str, push_url: &str, timeout: Duration) -> Result<Self, ExplorerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            push_url: push_url.to_string(),
        })
    }

    /// Create a client for Bitcoin mainnet
    pub fn new_mainnet() -> Result<Self, ExplorerError> {
        let base_url = Network::Mainnet.default_explorer_url();
        Self::new(
            base_url,
            &format!("{}/tx/push", base_url),
            Duration::from_secs(10),
        )
    }

    /// Create a client from configuration
    pub fn from_config(config: &TelepathConfig) -> Result<Self, ExplorerError> {
        Self::new(&config.explorer_url, &config.push_url, config.http_timeout)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the unspent-output URL for a batch of addresses
    pub fn unspent_url(&self, addresses: &[String]) -> String {
        format!("{}/address/unspent/{}", self.base_url, addresses.join(","))
    }
}

#[async_trait]
impl LedgerQuery for ExplorerClient {
    async fn unspent(&self, addresses: &[String]) -> Result<Vec<AddressUnspent>, ExplorerError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.unspent_url(addresses);
        tracing::debug!(target: "telepath::monitor", %url, "querying unspent outputs");

        let resp = self.client.get(&url).send().await?;
        let http_status = resp.status();
        let body = resp.text().await?;

        let decoded: UnspentResponse = serde_json::from_str(&body).map_err(|e| {
            ExplorerError::Decode(format!("unspent response (HTTP {}): {}", http_status, e))
        })?;

        decoded.into_entries()
    }
}

#[async_trait]
impl Broadcaster for ExplorerClient {
    async fn broadcast(&self, tx_hex: &str) -> Result<String, ExplorerError> {
        let payload = PushRequest {
            hex: tx_hex.to_string(),
        };
        let resp = self.client.post(&self.push_url).json(&payload).send().await?;
        let http_ok = resp.status().is_success();
        let body = resp.text().await?;

        tracing::debug!(target: "telepath::spend", %body, "push response");
        interpret_push_response(http_ok, &body)
    }
}

/// Interpret a push endpoint response body.
///
/// Only an explicit success status carrying a reference counts as success.
/// An explicit failure status is a rejection; anything else is ambiguous and
/// must be treated as "not broadcast".
pub fn interpret_push_response(http_ok: bool, body: &str) -> Result<String, ExplorerError> {
    let decoded: PushResponse = match serde_json::from_str(body) {
        Ok(decoded) => decoded,
        Err(e) => {
            return Err(ExplorerError::Ambiguous(format!(
                "undecodable push response (http ok: {}): {}",
                http_ok, e
            )))
        }
    };

    match decoded.status.as_str() {
        STATUS_SUCCESS if http_ok => match decoded.data {
            Some(serde_json::Value::String(txid)) if !txid.is_empty() => Ok(txid),
            other => Err(ExplorerError::Ambiguous(format!(
                "success without transaction reference: {:?}",
                other
            ))),
        },
        "fail" | "error" => Err(ExplorerError::Rejected(
            decoded
                .message
                .filter(|m| !m.is_empty())
                .or_else(|| decoded.data.map(|d| d.to_string()))
                .unwrap_or_else(|| decoded.status.clone()),
        )),
        other => Err(ExplorerError::Ambiguous(format!(
            "unexpected push status '{}' (http ok: {})",
            other, http_ok
        ))),
    }
}

// =============================================================================
// Explorer API Types
// =============================================================================

/// Unspent-output query response
#[derive(Debug, Clone, Deserialize)]
pub struct UnspentResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<UnspentData>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The explorer returns an object for one address and a list for several
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnspentData {
    Many(Vec<AddressUnspent>),
    One(AddressUnspent),
}

impl UnspentResponse {
    /// Validate the overall status and flatten the per-address entries
    pub fn into_entries(self) -> Result<Vec<AddressUnspent>, ExplorerError> {
        if self.status != STATUS_SUCCESS {
            return Err(ExplorerError::Status(format!(
                "{}{}",
                self.status,
                self.message.map(|m| format!(": {}", m)).unwrap_or_default()
            )));
        }

        Ok(match self.data {
            Some(UnspentData::Many(entries)) => entries,
            Some(UnspentData::One(entry)) => vec![entry],
            None => Vec::new(),
        })
    }
}

/// Unspent outputs of a single address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressUnspent {
    pub address: String,
    #[serde(default)]
    pub unspent: Vec<UnspentItem>,
}

/// One unspent output as reported by the explorer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnspentItem {
    /// Transaction id (display hex)
    pub tx: String,
    /// Decimal BTC amount, e.g. "0.00020000"
    pub amount: String,
    /// Output index
    #[serde(rename = "n")]
    pub vout: u32,
    #[serde(default)]
    pub confirmations: u32,
    /// Locking script (hex)
    pub script: String,
}

#[derive(Debug, Serialize)]
struct PushRequest {
    hex: String,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    status: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Explorer error types
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("explorer returned status {0}")]
    Status(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("ambiguous broadcast response: {0}")]
    Ambiguous(String),
}

impl From<ExplorerError> for WalletError {
    fn from(err: ExplorerError) -> Self {
        match err {
            ExplorerError::Rejected(reason) => WalletError::BroadcastRejected(reason),
            other => WalletError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspent_url_joins_addresses() {
        let client = ExplorerClient::new_mainnet().unwrap();
        let addresses = vec![
            "myAddress".to_string(),
            "hello".to_string(),
            "world".to_string(),
        ];
        assert_eq!(
            client.unspent_url(&addresses),
            "http://btc.blockr.io/api/v1/address/unspent/myAddress,hello,world"
        );
    }

    #[test]
    fn test_client_urls() {
        let client =
            ExplorerClient::new("http://localhost:8080/api/", "http://localhost:8080/push", Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn test_decode_unspent_list() {
        let body = r#"{
            "status": "success",
            "data": [
                {"address": "a1", "unspent": [
                    {"tx": "aa631d3cb0c98ada8ddb3ec82f23de2a948819e841a00ad740794837b7fbd7e9",
                     "amount": "0.00020000", "n": 1, "confirmations": 7,
                     "script": "76a914000000000000000000000000000000000000000088ac"}
                ]},
                {"address": "a2", "unspent": []}
            ],
            "code": 200,
            "message": ""
        }"#;
        let decoded: UnspentResponse = serde_json::from_str(body).unwrap();
        let entries = decoded.into_entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].unspent[0].vout, 1);
        assert_eq!(entries[0].unspent[0].amount, "0.00020000");
        assert!(entries[1].unspent.is_empty());
    }

    #[test]
    fn test_decode_single_address_object() {
        let body = r#"{"status":"success","data":{"address":"a1","unspent":[]}}"#;
        let decoded: UnspentResponse = serde_json::from_str(body).unwrap();
        let entries = decoded.into_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].address, "a1");
    }

    #[test]
    fn test_non_success_status_is_error() {
        let body = r#"{"status":"fail","data":null,"message":"rate limited"}"#;
        let decoded: UnspentResponse = serde_json::from_str(body).unwrap();
        let err = decoded.into_entries().unwrap_err();
        assert!(matches!(err, ExplorerError::Status(ref s) if s.contains("rate limited")));
    }

    #[test]
    fn test_push_success() {
        let body = r#"{"status":"success","data":"9a2b3c","code":200,"message":""}"#;
        assert_eq!(interpret_push_response(true, body).unwrap(), "9a2b3c");
    }

    #[test]
    fn test_push_rejected() {
        let body = r#"{"status":"fail","data":"Could not push your transaction!","code":500,"message":"Did you sign your transaction?"}"#;
        let err = interpret_push_response(false, body).unwrap_err();
        assert!(matches!(err, ExplorerError::Rejected(ref m) if m.contains("sign")));
        assert!(matches!(WalletError::from(err), WalletError::BroadcastRejected(_)));
    }

    #[test]
    fn test_push_ambiguous_responses() {
        assert!(matches!(
            interpret_push_response(true, "<html>bad gateway</html>"),
            Err(ExplorerError::Ambiguous(_))
        ));
        assert!(matches!(
            interpret_push_response(true, r#"{"status":"success","data":""}"#),
            Err(ExplorerError::Ambiguous(_))
        ));
        assert!(matches!(
            interpret_push_response(false, r#"{"status":"success","data":"abc"}"#),
            Err(ExplorerError::Ambiguous(_))
        ));
        assert!(matches!(
            interpret_push_response(true, r#"{"status":"pending"}"#),
            Err(ExplorerError::Ambiguous(_))
        ));
    }
}
