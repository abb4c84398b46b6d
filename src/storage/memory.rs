//! In-Memory Storage Implementations
//!
//! Provides in-memory storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{ReservationStore, SeenAddressStore, StorageError, StorageResult};
use crate::types::Reservation;

/// In-memory reservation store
///
/// Thread-safe storage for reservation rows. Every mutation happens under
/// a single write lock, so `mark_spent` has exactly one winner.
#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    rows: Arc<RwLock<Vec<Reservation>>>,
}

impl MemoryReservationStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn insert(&self, record: &Reservation) -> StorageResult<i64> {
        if record.amount <= 0 {
            return Err(StorageError::Database(format!(
                "amount must be positive: {}",
                record.amount
            )));
        }

        let mut rows = self.rows.write().await;
        if rows.iter().any(|r| r.uuid == record.uuid) {
            return Err(StorageError::Duplicate(record.uuid.clone()));
        }

        let id = rows.len() as i64 + 1;
        let mut stored = record.clone();
        stored.id = id;
        rows.push(stored);

        Ok(id)
    }

    async fn total_unspent(&self, address: &str) -> StorageResult<i64> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.address == address && !r.spent)
            .map(|r| r.amount)
            .sum())
    }

    async fn find_unspent(&self, address: &str, uuid: &str) -> StorageResult<Vec<Reservation>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.address == address && r.uuid == uuid && !r.spent)
            .cloned()
            .collect())
    }

    async fn get(&self, address: &str, uuid: &str) -> StorageResult<Option<Reservation>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.address == address && r.uuid == uuid)
            .cloned())
    }

    async fn mark_spent(&self, address: &str, uuid: &str) -> StorageResult<bool> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|r| r.address == address && r.uuid == uuid && !r.spent)
        {
            Some(row) => {
                row.spent = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_for_address(&self, address: &str) -> StorageResult<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.address == address)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }
}

/// In-memory seen-address set
#[derive(Clone, Default)]
pub struct MemorySeenAddresses {
    scores: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemorySeenAddresses {
    /// Create a new empty set
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenAddressStore for MemorySeenAddresses {
    async fn record_seen(&self, address: &str, timestamp: i64) -> StorageResult<()> {
        self.scores
            .write()
            .await
            .insert(address.to_string(), timestamp);
        Ok(())
    }

    async fn seen_between(&self, min_score: i64, max_score: i64) -> StorageResult<Vec<String>> {
        let scores = self.scores.read().await;
        let mut found: Vec<(&String, &i64)> = scores
            .iter()
            .filter(|(_, score)| **score >= min_score && **score <= max_score)
            .collect();
        found.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));

        Ok(found.into_iter().map(|(addr, _)| addr.clone()).collect())
    }
}
