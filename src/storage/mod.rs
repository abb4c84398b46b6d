//! Storage Layer Module
//!
//! Provides persistence for reservations and for the seen-address set
//! that drives address discovery.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::{MemoryReservationStore, MemorySeenAddresses};
pub use sqlite::{SqliteReservationStore, SqliteSeenAddresses};
pub use traits::{ReservationStore, SeenAddressStore, StorageError, StorageResult};
