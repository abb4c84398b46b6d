//! Shared Types Module
//!
//! Data types shared across the monitor, ledger and transaction manager.

pub mod balance;
pub mod contracts;
pub mod reservation;
pub mod units;

// Re-exports for convenience
pub use balance::{AddressBalance, InputSelection, UnspentOutput};
pub use contracts::{
    BalanceResponse, ErrorResponse, ReserveRequest, ReserveResponse, SpendRequest, SpendResponse,
};
pub use reservation::Reservation;
pub use units::{parse_btc, parse_sats, sats_to_btc_string, SATS_PER_BTC};
