//! Balance Snapshot
//!
//! Immutable map of address → confirmed balance and unspent outputs, built
//! once per refresh cycle and then published whole.

use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::{ScriptBuf, Txid};

use crate::explorer::{AddressUnspent, ExplorerError, UnspentItem};
use crate::types::{parse_btc, AddressBalance, InputSelection, UnspentOutput};

/// One published refresh result
#[derive(Debug, Clone, Default)]
pub struct BalanceSnapshot {
    balances: HashMap<String, AddressBalance>,
    /// Unix timestamp of the refresh that produced this snapshot (0 = never refreshed)
    pub refreshed_at: i64,
}

impl BalanceSnapshot {
    /// Build a snapshot from fully decoded entries
    pub fn new(balances: HashMap<String, AddressBalance>, refreshed_at: i64) -> Self {
        Self {
            balances,
            refreshed_at,
        }
    }

    /// Decode explorer entries into a snapshot; any malformed output fails the whole build
    pub fn from_explorer(
        entries: Vec<AddressUnspent>,
        refreshed_at: i64,
    ) -> Result<Self, ExplorerError> {
        let mut balances = HashMap::with_capacity(entries.len());
        for entry in entries {
            let balance = decode_entry(entry)?;
            balances.insert(balance.address.clone(), balance);
        }

        Ok(Self::new(balances, refreshed_at))
    }

    /// Entry for an address, if it was part of this snapshot
    pub fn get(&self, address: &str) -> Option<&AddressBalance> {
        self.balances.get(address)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Greedy input selection against this snapshot.
    ///
    /// Walks outputs in explorer order until the running total reaches
    /// `target`, the same walk order as the stored output list. Unconfirmed
    /// outputs are skipped since they are not part of the balance.
    pub fn select_inputs(&self, address: &str, target: i64) -> InputSelection {
        let entry = match self.balances.get(address) {
            Some(entry) => entry,
            None => return InputSelection::unknown_address(),
        };

        if target <= 0 || entry.balance < target {
            return InputSelection::empty();
        }

        let mut selection = InputSelection::empty();
        for output in entry.unspent.iter().filter(|u| u.is_confirmed()) {
            selection.inputs.push(output.outpoint());
            selection.scripts.push(output.script_pubkey.clone());
            selection.total_selected = selection.total_selected.saturating_add(output.value);

            if selection.total_selected >= target {
                break;
            }
        }

        selection
    }
}

fn decode_entry(entry: AddressUnspent) -> Result<AddressBalance, ExplorerError> {
    let unspent = entry
        .unspent
        .iter()
        .map(|item| decode_output(&entry.address, item))
        .collect::<Result<Vec<_>, _>>()?;

    let address = entry.address;
    AddressBalance::from_outputs(address.clone(), unspent)
        .ok_or_else(|| ExplorerError::Decode(format!("{}: balance overflows", address)))
}

fn decode_output(address: &str, item: &UnspentItem) -> Result<UnspentOutput, ExplorerError> {
    let txid = Txid::from_str(&item.tx)
        .map_err(|e| ExplorerError::Decode(format!("{}: bad txid '{}': {}", address, item.tx, e)))?;

    let value = parse_btc(&item.amount)
        .filter(|v| *v >= 0)
        .ok_or_else(|| {
            ExplorerError::Decode(format!("{}: bad amount '{}'", address, item.amount))
        })?;

    let script_pubkey = ScriptBuf::from_hex(&item.script).map_err(|e| {
        ExplorerError::Decode(format!("{}: bad script '{}': {}", address, item.script, e))
    })?;

    Ok(UnspentOutput {
        txid,
        vout: item.vout,
        value,
        confirmations: item.confirmations,
        script_pubkey,
    })
}
