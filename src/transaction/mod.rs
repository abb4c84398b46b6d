//! Transaction Module
//!
//! Spends reservations: builds a transaction from monitor-selected inputs,
//! signs it with the custodial key, broadcasts it and commits the spend to
//! the reserve ledger.
//!
//! ## Flow
//!
//! 1. Look up the reservation amount (ledger)
//! 2. Re-check the address balance against all open reservations
//! 3. Select inputs (monitor)
//! 4. Build destination + change outputs with the fixed fee
//! 5. Sign each input (P2PKH, SIGHASH_ALL)
//! 6. Broadcast, then mark the reservation spent

pub mod builder;
pub mod manager;
pub mod signer;

pub use builder::{BuilderError, TxBuilder, UnsignedTx};
pub use manager::TransactionManager;
pub use signer::{SignerError, SingleKeySigner};
