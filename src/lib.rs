//! Telepath - Custodial UTXO Wallet Core
//!
//! Tracks the confirmed balance of many custodial Bitcoin addresses, lets
//! callers earmark part of a balance for a later spend, and turns those
//! reservations into signed, broadcast transactions.
//!
//! ## Components
//!
//! 1. **UTXO Monitor** - Periodically rebuilds a balance snapshot from a
//!    ledger explorer and answers balance / input-selection queries
//! 2. **Reserve Ledger** - Persisted reservations with exactly-once spend
//! 3. **Transaction Manager** - Build, sign, broadcast, commit
//! 4. **Wallet** - Balance / reserve / spend operations over all three
//!
//! The HTTP layer that exposes these operations lives outside this crate;
//! it consumes the data contracts in [`types`].

pub mod common;
pub mod explorer;
pub mod ledger;
pub mod monitor;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod wallet;

// Re-exports: configuration, errors, logging
pub use common::{config, logging};
pub use common::{ConfigError, Network, Result, TelepathConfig, WalletError};

// Re-exports: explorer client
pub use explorer::{Broadcaster, ExplorerClient, ExplorerError, LedgerQuery};

// Re-exports: components
pub use ledger::ReserveLedger;
pub use monitor::{AddressSource, BalanceSnapshot, MonitorConfig, RefreshResult, UtxoMonitor};
pub use transaction::{SingleKeySigner, TransactionManager, TxBuilder};
pub use wallet::Wallet;

// Re-exports: storage
pub use storage::{
    MemoryReservationStore, MemorySeenAddresses, ReservationStore, SeenAddressStore,
    SqliteReservationStore, SqliteSeenAddresses, StorageError,
};

// Re-exports: shared types
pub use types::{
    AddressBalance, BalanceResponse, InputSelection, ReserveRequest, ReserveResponse, Reservation,
    SpendRequest, SpendResponse, UnspentOutput,
};

/// Satoshi conversion helpers
pub use types::units;
