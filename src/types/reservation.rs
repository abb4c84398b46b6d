//! Reservation Types
//!
//! A reservation earmarks part of an address's confirmed balance for a
//! future spend. Rows are immutable except for the one-way `spent` flag.

use serde::{Deserialize, Serialize};

/// A persisted reservation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Storage row id (0 until persisted)
    pub id: i64,
    /// Globally unique reservation id handed to callers
    pub uuid: String,
    /// Address the funds are reserved on
    pub address: String,
    /// Reserved amount in satoshis (always > 0)
    pub amount: i64,
    /// Set once the spending transaction has been broadcast
    pub spent: bool,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl Reservation {
    /// Create a new unspent reservation with a fresh UUID
    pub fn new(address: impl Into<String>, amount: i64) -> Self {
        Self {
            id: 0,
            uuid: uuid::Uuid::new_v4().to_string(),
            address: address.into(),
            amount,
            spent: false,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reservation_is_unspent() {
        let r = Reservation::new("1BoatSLRHtKNngkdXEeobR76b53LETtpyT", 50_000);
        assert!(!r.spent);
        assert_eq!(r.amount, 50_000);
        assert_eq!(r.uuid.len(), 36);
    }

    #[test]
    fn test_uuids_differ() {
        let a = Reservation::new("addr", 1);
        let b = Reservation::new("addr", 1);
        assert_ne!(a.uuid, b.uuid);
    }
}
