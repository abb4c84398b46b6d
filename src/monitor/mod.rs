//! UTXO Monitor Module
//!
//! Keeps a periodically refreshed view of every monitored address's
//! confirmed balance and unspent outputs, and answers balance and
//! input-selection queries against it.
//!
//! ## Components
//!
//! - **Snapshot**: immutable per-cycle balance map with greedy input selection
//! - **Discovery**: recency window over observed addresses
//! - **Service**: the monitor itself and its two-timer refresh loop

pub mod discovery;
pub mod service;
pub mod snapshot;

pub use discovery::AddressSource;
pub use service::{MonitorConfig, RefreshResult, UtxoMonitor};
pub use snapshot::BalanceSnapshot;
