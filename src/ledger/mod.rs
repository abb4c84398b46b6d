//! Reserve Ledger
//!
//! Durable reservations that earmark part of an address's confirmed balance
//! for a future spend. The ledger itself never looks at balances; the
//! balance check happens in the wallet facade at creation time and in the
//! transaction manager at spend time.

use std::sync::Arc;

use crate::common::{log_reservation_event, Result, WalletError};
use crate::storage::ReservationStore;
use crate::types::Reservation;

/// Reservation ledger over a pluggable store
#[derive(Clone)]
pub struct ReserveLedger {
    store: Arc<dyn ReservationStore>,
}

impl ReserveLedger {
    /// Create a ledger over the given store
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Create a new reservation and return its id
    pub async fn create_reservation(&self, address: &str, amount: i64) -> Result<String> {
        if amount <= 0 {
            return Err(WalletError::validation(format!(
                "reservation amount must be positive, got {}",
                amount
            )));
        }

        let record = Reservation::new(address, amount);
        match self.store.insert(&record).await {
            Ok(_) => {
                log_reservation_event("reservation_created", &record.uuid, address, Some(amount), None);
                Ok(record.uuid)
            }
            Err(e) => {
                let message = e.to_string();
                log_reservation_event(
                    "reservation_failed",
                    &record.uuid,
                    address,
                    Some(amount),
                    Some(&message),
                );
                Err(e.into())
            }
        }
    }

    /// Sum of all unspent reservations for an address
    pub async fn total_reserved(&self, address: &str) -> Result<i64> {
        Ok(self.store.total_unspent(address).await?)
    }

    /// Amount of the single unspent reservation matching address and id
    pub async fn amount_for_reservation(&self, address: &str, reservation_id: &str) -> Result<i64> {
        let rows = self.store.find_unspent(address, reservation_id).await?;

        match rows.as_slice() {
            [row] => Ok(row.amount),
            [] => Err(WalletError::not_found(format!(
                "reservation {} for {}",
                reservation_id, address
            ))),
            _ => {
                tracing::error!(
                    target: "telepath::ledger",
                    reservation_id,
                    address,
                    rows = rows.len(),
                    "duplicate unspent reservation rows"
                );
                Err(WalletError::not_found(format!(
                    "reservation {} for {} is ambiguous",
                    reservation_id, address
                )))
            }
        }
    }

    /// Flip a reservation to spent; only one caller ever succeeds
    pub async fn mark_spent(&self, address: &str, reservation_id: &str) -> Result<()> {
        if self.store.mark_spent(address, reservation_id).await? {
            log_reservation_event("reservation_spent", reservation_id, address, None, None);
            return Ok(());
        }

        match self.store.get(address, reservation_id).await? {
            Some(row) if row.spent => Err(WalletError::AlreadySpent(reservation_id.to_string())),
            _ => Err(WalletError::not_found(format!(
                "reservation {} for {}",
                reservation_id, address
            ))),
        }
    }

    /// Reservation row regardless of spent state
    pub async fn reservation(&self, address: &str, reservation_id: &str) -> Result<Reservation> {
        self.store
            .get(address, reservation_id)
            .await?
            .ok_or_else(|| {
                WalletError::not_found(format!("reservation {} for {}", reservation_id, address))
            })
    }

    /// All reservations for an address, newest first
    pub async fn reservations_for(&self, address: &str) -> Result<Vec<Reservation>> {
        Ok(self.store.list_for_address(address).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryReservationStore, SqliteReservationStore};
    use std::collections::HashSet;

    fn sqlite_ledger() -> ReserveLedger {
        ReserveLedger::new(Arc::new(SqliteReservationStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let store = Arc::new(MemoryReservationStore::new());
        let ledger = ReserveLedger::new(store.clone());

        for amount in [0, -1, -100_000_000] {
            let err = ledger.create_reservation("addr", amount).await.unwrap_err();
            assert!(matches!(err, WalletError::Validation(_)));
        }
        assert_eq!(store.len().await, 0);
        assert_eq!(ledger.total_reserved("addr").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_total_reserved_sums_unspent() {
        let ledger = sqlite_ledger();
        assert_eq!(ledger.total_reserved("myAddress").await.unwrap(), 0);

        let first = ledger
            .create_reservation("myAddress", 100_000_000)
            .await
            .unwrap();
        ledger
            .create_reservation("myAddress", 50_000_000)
            .await
            .unwrap();
        assert_eq!(ledger.total_reserved("myAddress").await.unwrap(), 150_000_000);

        ledger.mark_spent("myAddress", &first).await.unwrap();
        assert_eq!(ledger.total_reserved("myAddress").await.unwrap(), 50_000_000);
    }

    #[tokio::test]
    async fn test_amount_for_reservation() {
        let ledger = sqlite_ledger();
        let id = ledger.create_reservation("addr", 42_000).await.unwrap();

        assert_eq!(ledger.amount_for_reservation("addr", &id).await.unwrap(), 42_000);
        assert!(matches!(
            ledger.amount_for_reservation("other", &id).await,
            Err(WalletError::NotFound(_))
        ));
        assert!(matches!(
            ledger.amount_for_reservation("addr", "no-such-id").await,
            Err(WalletError::NotFound(_))
        ));

        ledger.mark_spent("addr", &id).await.unwrap();
        assert!(matches!(
            ledger.amount_for_reservation("addr", &id).await,
            Err(WalletError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_spent_reports_already_spent() {
        let ledger = sqlite_ledger();
        let id = ledger.create_reservation("addr", 1).await.unwrap();

        ledger.mark_spent("addr", &id).await.unwrap();
        assert!(matches!(
            ledger.mark_spent("addr", &id).await,
            Err(WalletError::AlreadySpent(_))
        ));
        assert!(matches!(
            ledger.mark_spent("addr", "missing").await,
            Err(WalletError::NotFound(_))
        ));
        assert!(ledger.reservation("addr", &id).await.unwrap().spent);
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_unique_ids() {
        let ledger = sqlite_ledger();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.create_reservation("addr", 10).await.unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(ledger.total_reserved("addr").await.unwrap(), 160);
    }

    #[tokio::test]
    async fn test_concurrent_mark_spent_single_winner() {
        let ledger = ReserveLedger::new(Arc::new(MemoryReservationStore::new()));
        let id = ledger.create_reservation("addr", 10).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { ledger.mark_spent("addr", &id).await }));
        }

        let mut ok = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(WalletError::AlreadySpent(_)) => already += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(already, 7);
    }

    #[tokio::test]
    async fn test_reservations_listing() {
        let ledger = sqlite_ledger();
        let a = ledger.create_reservation("addr", 1).await.unwrap();
        let b = ledger.create_reservation("addr", 2).await.unwrap();
        ledger.create_reservation("other", 3).await.unwrap();

        let rows = ledger.reservations_for("addr").await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(ids, vec![b.as_str(), a.as_str()]);
    }
}
