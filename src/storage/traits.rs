//! Storage Trait Definitions
//!
//! Abstract storage interfaces for reservations and for the recency-scored
//! set of seen addresses. Implementations can use SQLite (production) or
//! in-memory (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::common::WalletError;
use crate::types::Reservation;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for WalletError {
    fn from(err: StorageError) -> Self {
        WalletError::Storage(err.to_string())
    }
}

/// Reservation storage interface
///
/// Implementations:
/// - `SqliteReservationStore` - Production storage with SQLite
/// - `MemoryReservationStore` - In-memory storage for testing
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a new reservation row, returning its row id
    async fn insert(&self, record: &Reservation) -> StorageResult<i64>;

    /// Sum of amounts of unspent rows for an address (0 if none)
    async fn total_unspent(&self, address: &str) -> StorageResult<i64>;

    /// All unspent rows matching both address and reservation id
    async fn find_unspent(&self, address: &str, uuid: &str) -> StorageResult<Vec<Reservation>>;

    /// Row matching address and reservation id, spent or not
    async fn get(&self, address: &str, uuid: &str) -> StorageResult<Option<Reservation>>;

    /// Flip `spent` from false to true; returns false if no unspent row matched
    async fn mark_spent(&self, address: &str, uuid: &str) -> StorageResult<bool>;

    /// All rows for an address, newest first
    async fn list_for_address(&self, address: &str) -> StorageResult<Vec<Reservation>>;
}

/// Recency-scored set of addresses observed by the wallet front-end
///
/// Scores are unix timestamps (seconds) of the most recent observation.
#[async_trait]
pub trait SeenAddressStore: Send + Sync {
    /// Record (or refresh) an observation of `address` at `timestamp`
    async fn record_seen(&self, address: &str, timestamp: i64) -> StorageResult<()>;

    /// Addresses whose score lies in `[min_score, max_score]`, ascending by score
    async fn seen_between(&self, min_score: i64, max_score: i64) -> StorageResult<Vec<String>>;
}
