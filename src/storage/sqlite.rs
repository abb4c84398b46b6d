//! SQLite Persistent Storage
//!
//! Durable storage for reservations and for the seen-address set.
//! Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use super::traits::{ReservationStore, SeenAddressStore, StorageError, StorageResult};
use crate::types::Reservation;

type SqlitePool = Pool<SqliteConnectionManager>;

/// Open a pooled connection manager, file-backed or in-memory
fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<SqlitePool, StorageError> {
    let manager = manager.with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));

    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| StorageError::Connection(e.to_string()))
}

fn file_manager<P: AsRef<Path>>(db_path: P) -> SqliteConnectionManager {
    // Ensure parent directory exists
    if let Some(parent) = db_path.as_ref().parent() {
        std::fs::create_dir_all(parent).ok();
    }
    SqliteConnectionManager::file(db_path)
}

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

// =============================================================================
// Reservations
// =============================================================================

/// SQLite-backed reservation store with connection pooling
pub struct SqliteReservationStore {
    pool: SqlitePool,
}

impl SqliteReservationStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let store = Self {
            pool: build_pool(file_manager(db_path), 10)?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    ///
    /// A single pooled connection keeps every caller on the same database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            pool: build_pool(SqliteConnectionManager::memory(), 1)?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                address TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                spent INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reservations_address_spent
                ON reservations(address, spent);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Convert a database row to Reservation
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
        Ok(Reservation {
            id: row.get("id")?,
            uuid: row.get("uuid")?,
            address: row.get("address")?,
            amount: row.get("amount")?,
            spent: row.get::<_, i64>("spent")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    // Synchronous helper methods for the trait implementations

    fn insert_sync(&self, record: &Reservation) -> Result<i64, StorageError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO reservations (uuid, address, amount, spent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.uuid,
                record.address,
                record.amount,
                record.spent as i64,
                record.created_at,
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(record.uuid.clone());
                }
            }
            db_err(e)
        })?;

        Ok(conn.last_insert_rowid())
    }

    fn total_unspent_sync(&self, address: &str) -> Result<i64, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM reservations WHERE address = ?1 AND spent = 0",
            params![address],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn find_unspent_sync(&self, address: &str, uuid: &str) -> Result<Vec<Reservation>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT * FROM reservations WHERE address = ?1 AND uuid = ?2 AND spent = 0",
            )
            .map_err(db_err)?;

        let records = stmt
            .query_map(params![address, uuid], |row| Self::row_to_record(row))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(records)
    }

    fn get_sync(&self, address: &str, uuid: &str) -> Result<Option<Reservation>, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT * FROM reservations WHERE address = ?1 AND uuid = ?2",
            params![address, uuid],
            |row| Self::row_to_record(row),
        )
        .optional()
        .map_err(db_err)
    }

    fn mark_spent_sync(&self, address: &str, uuid: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;

        // Single conditional UPDATE: of two racing callers only one sees a changed row.
        let rows_affected = conn
            .execute(
                "UPDATE reservations SET spent = 1 WHERE address = ?1 AND uuid = ?2 AND spent = 0",
                params![address, uuid],
            )
            .map_err(db_err)?;

        Ok(rows_affected == 1)
    }

    fn list_for_address_sync(&self, address: &str) -> Result<Vec<Reservation>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT * FROM reservations WHERE address = ?1 ORDER BY id DESC")
            .map_err(db_err)?;

        let records = stmt
            .query_map(params![address], |row| Self::row_to_record(row))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(records)
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    async fn insert(&self, record: &Reservation) -> StorageResult<i64> {
        self.insert_sync(record)
    }

    async fn total_unspent(&self, address: &str) -> StorageResult<i64> {
        self.total_unspent_sync(address)
    }

    async fn find_unspent(&self, address: &str, uuid: &str) -> StorageResult<Vec<Reservation>> {
        self.find_unspent_sync(address, uuid)
    }

    async fn get(&self, address: &str, uuid: &str) -> StorageResult<Option<Reservation>> {
        self.get_sync(address, uuid)
    }

    async fn mark_spent(&self, address: &str, uuid: &str) -> StorageResult<bool> {
        self.mark_spent_sync(address, uuid)
    }

    async fn list_for_address(&self, address: &str) -> StorageResult<Vec<Reservation>> {
        self.list_for_address_sync(address)
    }
}

// =============================================================================
// Seen addresses
// =============================================================================

/// SQLite-backed recency-scored address set
pub struct SqliteSeenAddresses {
    pool: SqlitePool,
}

impl SqliteSeenAddresses {
    /// Create a new store with the given database path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let store = Self {
            pool: build_pool(file_manager(db_path), 4)?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            pool: build_pool(SqliteConnectionManager::memory(), 1)?,
        };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        self.conn()?
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS seen_addresses (
                    address TEXT PRIMARY KEY,
                    score INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_seen_addresses_score ON seen_addresses(score);
                "#,
            )
            .map_err(db_err)
    }
}

#[async_trait]
impl SeenAddressStore for SqliteSeenAddresses {
    async fn record_seen(&self, address: &str, timestamp: i64) -> StorageResult<()> {
        self.conn()?
            .execute(
                r#"
                INSERT INTO seen_addresses (address, score) VALUES (?1, ?2)
                ON CONFLICT(address) DO UPDATE SET score = excluded.score
                "#,
                params![address, timestamp],
            )
            .map_err(db_err)?;

        Ok(())
    }

    async fn seen_between(&self, min_score: i64, max_score: i64) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT address FROM seen_addresses
                WHERE score BETWEEN ?1 AND ?2
                ORDER BY score ASC, address ASC
                "#,
            )
            .map_err(db_err)?;

        let addresses = stmt
            .query_map(params![min_score, max_score], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(db_err)?;

        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_and_total() {
        let store = SqliteReservationStore::in_memory().unwrap();
        assert_eq!(store.total_unspent("myAddress").await.unwrap(), 0);

        store
            .insert(&Reservation::new("myAddress", 100_000_000))
            .await
            .unwrap();
        store
            .insert(&Reservation::new("myAddress", 50_000_000))
            .await
            .unwrap();
        store
            .insert(&Reservation::new("otherAddress", 7))
            .await
            .unwrap();

        assert_eq!(store.total_unspent("myAddress").await.unwrap(), 150_000_000);
    }

    #[tokio::test]
    async fn test_duplicate_uuid() {
        let store = SqliteReservationStore::in_memory().unwrap();
        let record = Reservation::new("addr", 10);

        store.insert(&record).await.unwrap();
        let result = store.insert(&record).await;

        assert!(matches!(result, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected_by_schema() {
        let store = SqliteReservationStore::in_memory().unwrap();
        let result = store.insert(&Reservation::new("addr", 0)).await;
        assert!(result.is_err());
        assert_eq!(store.total_unspent("addr").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_spent_once() {
        let store = SqliteReservationStore::in_memory().unwrap();
        let record = Reservation::new("addr", 500);
        store.insert(&record).await.unwrap();

        assert!(store.mark_spent("addr", &record.uuid).await.unwrap());
        assert!(!store.mark_spent("addr", &record.uuid).await.unwrap());

        let stored = store.get("addr", &record.uuid).await.unwrap().unwrap();
        assert!(stored.spent);
        assert!(store.find_unspent("addr", &record.uuid).await.unwrap().is_empty());
        assert_eq!(store.total_unspent("addr").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_spent_requires_matching_address() {
        let store = SqliteReservationStore::in_memory().unwrap();
        let record = Reservation::new("addr", 500);
        store.insert(&record).await.unwrap();

        assert!(!store.mark_spent("someone-else", &record.uuid).await.unwrap());
        assert_eq!(store.total_unspent("addr").await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_concurrent_mark_spent_single_winner() {
        let dir = std::env::temp_dir().join(format!("telepath-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(SqliteReservationStore::new(dir.join("reserves.db")).unwrap());
        let record = Reservation::new("addr", 1_000);
        store.insert(&record).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let uuid = record.uuid.clone();
            handles.push(tokio::spawn(async move {
                store.mark_spent("addr", &uuid).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = SqliteReservationStore::in_memory().unwrap();
        let first = Reservation::new("addr", 1);
        let second = Reservation::new("addr", 2);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let rows = store.list_for_address("addr").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].uuid, second.uuid);
        assert!(rows[0].id > rows[1].id);
    }

    #[tokio::test]
    async fn test_seen_addresses_window() {
        let store = SqliteSeenAddresses::in_memory().unwrap();
        let now = 1_700_000_000;

        store.record_seen("hello", now).await.unwrap();
        store.record_seen("world", now - 3600).await.unwrap();
        store.record_seen("old", 0).await.unwrap();

        let found: HashSet<String> = store
            .seen_between(now - 86_400, now)
            .await
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(found.len(), 2);
        assert!(found.contains("hello"));
        assert!(found.contains("world"));
    }

    #[tokio::test]
    async fn test_seen_address_rescored() {
        let store = SqliteSeenAddresses::in_memory().unwrap();
        store.record_seen("addr", 0).await.unwrap();
        store.record_seen("addr", 1_000).await.unwrap();

        assert_eq!(store.seen_between(500, 2_000).await.unwrap(), vec!["addr"]);
        assert!(store.seen_between(0, 10).await.unwrap().is_empty());
    }
}
