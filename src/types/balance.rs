//! Balance Types
//!
//! Unspent outputs and per-address balances as published in a monitor
//! snapshot. Both are immutable once built.

use bitcoin::{OutPoint, ScriptBuf, Txid};

/// A previously received, not-yet-spent output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    /// Transaction that created the output
    pub txid: Txid,
    /// Output index within that transaction
    pub vout: u32,
    /// Value in satoshis
    pub value: i64,
    /// Confirmations reported by the explorer (0 = unconfirmed)
    pub confirmations: u32,
    /// Locking script the spend must satisfy
    pub script_pubkey: ScriptBuf,
}

impl UnspentOutput {
    /// Outpoint referencing this output
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    /// Whether the output counts towards the confirmed balance
    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }
}

/// Confirmed balance and unspent outputs of one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBalance {
    pub address: String,
    /// Sum of confirmed output values
    pub balance: i64,
    /// Unspent outputs in explorer order
    pub unspent: Vec<UnspentOutput>,
}

impl AddressBalance {
    /// Build from the explorer's output list, summing confirmed values.
    ///
    /// Returns `None` if the confirmed sum does not fit in an `i64`.
    pub fn from_outputs(address: impl Into<String>, unspent: Vec<UnspentOutput>) -> Option<Self> {
        let balance = unspent
            .iter()
            .filter(|u| u.is_confirmed())
            .try_fold(0i64, |total, u| total.checked_add(u.value))?;

        Some(Self {
            address: address.into(),
            balance,
            unspent,
        })
    }
}

/// Inputs chosen to fund a spend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSelection {
    /// Outpoints to spend, in selection order
    pub inputs: Vec<OutPoint>,
    /// Locking script of each input, index-aligned with `inputs`
    pub scripts: Vec<ScriptBuf>,
    /// Sum of selected values; `UNKNOWN_ADDRESS` if the address is not in the snapshot
    pub total_selected: i64,
}

impl InputSelection {
    /// Sentinel total for an address absent from the snapshot
    pub const UNKNOWN_ADDRESS: i64 = -1;

    /// Selection for an address the monitor has never seen
    pub fn unknown_address() -> Self {
        Self {
            total_selected: Self::UNKNOWN_ADDRESS,
            ..Self::default()
        }
    }

    /// Empty selection for a known address ("insufficient" or nothing requested)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_unknown_address(&self) -> bool {
        self.total_selected == Self::UNKNOWN_ADDRESS
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn output(value: i64, confirmations: u32) -> UnspentOutput {
        UnspentOutput {
            txid: Txid::from_str(
                "aa631d3cb0c98ada8ddb3ec82f23de2a948819e841a00ad740794837b7fbd7e9",
            )
            .unwrap(),
            vout: 0,
            value,
            confirmations,
            script_pubkey: ScriptBuf::new(),
        }
    }

    #[test]
    fn test_balance_counts_only_confirmed() {
        let entry = AddressBalance::from_outputs(
            "addr",
            vec![output(100_000, 3), output(50_000, 0), output(25_000, 1)],
        )
        .unwrap();
        assert_eq!(entry.balance, 125_000);
        assert_eq!(entry.unspent.len(), 3);
    }

    #[test]
    fn test_balance_overflow_rejected() {
        let entry = AddressBalance::from_outputs("addr", vec![output(i64::MAX, 1), output(1, 1)]);
        assert!(entry.is_none());

        // Unconfirmed values are not part of the sum
        let entry = AddressBalance::from_outputs("addr", vec![output(i64::MAX, 1), output(1, 0)]);
        assert_eq!(entry.unwrap().balance, i64::MAX);
    }

    #[test]
    fn test_selection_sentinels() {
        assert!(InputSelection::unknown_address().is_unknown_address());
        assert_eq!(InputSelection::unknown_address().total_selected, -1);
        assert_eq!(InputSelection::empty().total_selected, 0);
        assert!(!InputSelection::empty().is_unknown_address());
    }
}
