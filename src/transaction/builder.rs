//! Spend Transaction Builder
//!
//! Builds unsigned transactions paying a reservation to a destination.
//! The network fee is a fixed amount taken out of the reservation; whatever
//! the selected inputs carry beyond the reservation returns to the source
//! address as change.

use bitcoin::{
    absolute::LockTime, transaction::Version, Address, Amount, Network, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};
use std::str::FromStr;

use crate::common::config::DEFAULT_FIXED_FEE_SATS;
use crate::common::WalletError;
use crate::types::InputSelection;

/// Builds unsigned spend transactions
#[derive(Debug, Clone)]
pub struct TxBuilder {
    /// Network addresses must belong to
    network: Network,
    /// Fee deducted from every reservation (sats)
    fixed_fee: i64,
}

impl TxBuilder {
    /// Create a new transaction builder
    pub fn new(network: Network, fixed_fee: i64) -> Self {
        Self { network, fixed_fee }
    }

    /// Create mainnet builder with the default fee
    pub fn new_mainnet() -> Self {
        Self::new(Network::Bitcoin, DEFAULT_FIXED_FEE_SATS)
    }

    /// Build an unsigned transaction spending `amount` reserved on `source`
    ///
    /// Outputs, in order: destination (`amount - fee`), then change
    /// (`total_selected - amount`) to the source script when positive.
    pub fn build_spend(
        &self,
        source: &str,
        destination: &str,
        amount: i64,
        selection: &InputSelection,
    ) -> Result<UnsignedTx, BuilderError> {
        let source_script = self.validate_address(source)?.script_pubkey();
        let dest_script = self.validate_address(destination)?.script_pubkey();

        if amount <= self.fixed_fee {
            return Err(BuilderError::FeeExceedsAmount {
                amount,
                fee: self.fixed_fee,
            });
        }

        if selection.inputs.is_empty() || selection.total_selected < amount {
            return Err(BuilderError::InsufficientFunds {
                required: amount,
                available: selection.total_selected.max(0),
            });
        }

        if selection.inputs.len() != selection.scripts.len() {
            return Err(BuilderError::InputMismatch {
                inputs: selection.inputs.len(),
                scripts: selection.scripts.len(),
            });
        }

        let send_amount = amount - self.fixed_fee;
        let change_amount = selection.total_selected - amount;

        // Build inputs
        let inputs: Vec<TxIn> = selection
            .inputs
            .iter()
            .map(|outpoint| TxIn {
                previous_output: *outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect();

        // Build outputs
        let mut outputs = vec![TxOut {
            value: Amount::from_sat(send_amount as u64),
            script_pubkey: dest_script,
        }];

        if change_amount > 0 {
            outputs.push(TxOut {
                value: Amount::from_sat(change_amount as u64),
                script_pubkey: source_script,
            });
        }

        let tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };

        Ok(UnsignedTx {
            tx,
            scripts: selection.scripts.clone(),
            total_input: selection.total_selected,
            send_amount,
            change_amount: change_amount.max(0),
            fee: self.fixed_fee,
        })
    }

    /// Validate a Bitcoin address for this network
    pub fn validate_address(&self, address: &str) -> Result<Address, BuilderError> {
        Address::from_str(address)
            .map_err(|e| BuilderError::InvalidAddress(format!("{}: {}", address, e)))?
            .require_network(self.network)
            .map_err(|e| BuilderError::InvalidAddress(format!("{}: {}", address, e)))
    }
}

/// Unsigned transaction ready for signing
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    /// The unsigned transaction
    pub tx: Transaction,
    /// Locking script of each input, index-aligned with `tx.input`
    pub scripts: Vec<ScriptBuf>,
    /// Sum of input values
    pub total_input: i64,
    /// Amount paid to the destination
    pub send_amount: i64,
    /// Amount returned to the source (0 = no change output)
    pub change_amount: i64,
    /// Fee in satoshis
    pub fee: i64,
}

/// Builder errors
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("fee {fee} sats exceeds amount {amount} sats")]
    FeeExceedsAmount { amount: i64, fee: i64 },

    #[error("{inputs} inputs but {scripts} locking scripts")]
    InputMismatch { inputs: usize, scripts: usize },
}

impl From<BuilderError> for WalletError {
    fn from(err: BuilderError) -> Self {
        match err {
            BuilderError::InvalidAddress(msg) => WalletError::InvalidAddress(msg),
            BuilderError::InsufficientFunds {
                required,
                available,
            } => WalletError::InsufficientFunds {
                required,
                available,
            },
            BuilderError::FeeExceedsAmount { amount, fee } => {
                WalletError::FeeExceedsAmount { amount, fee }
            }
            other => WalletError::validation(other.to_string()),
        }
    }
}
