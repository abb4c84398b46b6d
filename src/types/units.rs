//! Unit Conversion Utilities
//!
//! Amounts are carried as signed satoshis (`i64`) so that the selection
//! sentinel and validation of non-positive requests stay representable.

use bitcoin::{Amount, Denomination};

/// Satoshis per Bitcoin
pub const SATS_PER_BTC: i64 = 100_000_000;

/// Parse a decimal BTC string (e.g. "0.00020000") into satoshis.
///
/// Parsing is exact; inputs with more than 8 decimal places or above
/// `Amount::MAX_MONEY` are rejected.
pub fn parse_btc(s: &str) -> Option<i64> {
    let amount = Amount::from_str_in(s.trim(), Denomination::Bitcoin).ok()?;
    if amount > Amount::MAX_MONEY {
        return None;
    }
    i64::try_from(amount.to_sat()).ok()
}

/// Convert satoshis to BTC string (e.g., "0.00100000")
pub fn sats_to_btc_string(sats: i64) -> String {
    let sign = if sats < 0 { "-" } else { "" };
    let abs = sats.unsigned_abs();
    let per_btc = SATS_PER_BTC as u64;
    format!("{}{}.{:08}", sign, abs / per_btc, abs % per_btc)
}

/// Parse satoshi amount from string
pub fn parse_sats(s: &str) -> Option<i64> {
    s.trim().replace([',', '_'], "").parse().ok()
}
