//! Transaction Manager
//!
//! Turns a reservation into a signed, broadcast transaction. One attempt
//! moves through: reservation lookup → balance re-check → input selection →
//! build → sign → broadcast → commit. The reservation is only marked spent
//! after the broadcast endpoint explicitly confirms, so every failure before
//! that point leaves it spendable.

use std::sync::Arc;

use bitcoin::{key::PrivateKey, Transaction};
use tokio::sync::Mutex;

use crate::common::{log_spend_event, Result, TelepathConfig, WalletError};
use crate::explorer::Broadcaster;
use crate::ledger::ReserveLedger;
use crate::monitor::UtxoMonitor;
use crate::transaction::builder::TxBuilder;
use crate::transaction::signer::SingleKeySigner;

/// Builds, signs, broadcasts and commits reservation spends
pub struct TransactionManager {
    monitor: Arc<UtxoMonitor>,
    ledger: ReserveLedger,
    broadcaster: Arc<dyn Broadcaster>,
    builder: TxBuilder,
    /// Serializes every build/broadcast/commit sequence
    spend_lock: Mutex<()>,
}

impl TransactionManager {
    pub fn new(
        monitor: Arc<UtxoMonitor>,
        ledger: ReserveLedger,
        broadcaster: Arc<dyn Broadcaster>,
        builder: TxBuilder,
    ) -> Self {
        Self {
            monitor,
            ledger,
            broadcaster,
            builder,
            spend_lock: Mutex::new(()),
        }
    }

    /// Create with network and fee taken from configuration
    pub fn from_config(
        config: &TelepathConfig,
        monitor: Arc<UtxoMonitor>,
        ledger: ReserveLedger,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let builder = TxBuilder::new(config.network.bitcoin_network(), config.fixed_fee_sats);
        Self::new(monitor, ledger, broadcaster, builder)
    }

    /// Build and sign the spend of a reservation, returning consensus-encoded bytes
    pub async fn build_transaction(
        &self,
        address: &str,
        reservation_id: &str,
        key: &PrivateKey,
        destination: &str,
    ) -> Result<Vec<u8>> {
        let (tx, _) = self
            .build_signed(address, reservation_id, key, destination)
            .await?;
        Ok(bitcoin::consensus::encode::serialize(&tx))
    }

    /// Spend a reservation; returns the broadcast endpoint's transaction reference
    pub async fn spend_reservation(
        &self,
        address: &str,
        reservation_id: &str,
        key: &PrivateKey,
        destination: &str,
    ) -> Result<String> {
        let _guard = self.spend_lock.lock().await;

        let (tx, amount) = match self
            .build_signed(address, reservation_id, key, destination)
            .await
        {
            Ok(built) => built,
            Err(e) => {
                log_spend_event(
                    "spend_build_failed",
                    reservation_id,
                    address,
                    0,
                    None,
                    Some((e.error_code(), e.to_string().as_str())),
                );
                return Err(e);
            }
        };

        let txid = tx.compute_txid().to_string();
        let tx_hex = bitcoin::consensus::encode::serialize_hex(&tx);
        log_spend_event("spend_signed", reservation_id, address, amount, Some(&txid), None);

        let reference = match self.broadcaster.broadcast(&tx_hex).await {
            Ok(reference) => reference,
            Err(e) => {
                let err = WalletError::from(e);
                log_spend_event(
                    "spend_broadcast_failed",
                    reservation_id,
                    address,
                    amount,
                    Some(&txid),
                    Some((err.error_code(), err.to_string().as_str())),
                );
                return Err(err);
            }
        };

        if reference != txid {
            tracing::warn!(
                target: "telepath::spend",
                %reference,
                %txid,
                "broadcast reference differs from computed txid"
            );
        }

        if let Err(e) = self.ledger.mark_spent(address, reservation_id).await {
            let err = WalletError::CommitFailed {
                txid: reference.clone(),
                reason: e.to_string(),
            };
            log_spend_event(
                "spend_commit_failed",
                reservation_id,
                address,
                amount,
                Some(&reference),
                Some((err.error_code(), err.to_string().as_str())),
            );
            return Err(err);
        }

        log_spend_event("spend_committed", reservation_id, address, amount, Some(&reference), None);
        Ok(reference)
    }

    async fn build_signed(
        &self,
        address: &str,
        reservation_id: &str,
        key: &PrivateKey,
        destination: &str,
    ) -> Result<(Transaction, i64)> {
        let amount = self.reservation_amount(address, reservation_id).await?;

        // The snapshot may have dropped since the reservation was approved.
        let balance = self.monitor.get_balance(address).await?;
        let reserved = self.ledger.total_reserved(address).await?;
        if balance < reserved {
            return Err(WalletError::InsufficientFunds {
                required: reserved,
                available: balance,
            });
        }

        let selection = self.monitor.select_inputs(address, amount).await;
        if selection.is_unknown_address() {
            return Err(WalletError::not_found(format!("address {}", address)));
        }
        if selection.total_selected < amount {
            return Err(WalletError::InsufficientFunds {
                required: amount,
                available: selection.total_selected,
            });
        }

        let unsigned = self
            .builder
            .build_spend(address, destination, amount, &selection)?;

        tracing::debug!(
            target: "telepath::spend",
            reservation_id,
            inputs = unsigned.tx.input.len(),
            send = unsigned.send_amount,
            change = unsigned.change_amount,
            "built spend"
        );

        let tx = SingleKeySigner::new(*key).sign(&unsigned)?;
        Ok((tx, amount))
    }

    /// Reservation amount, distinguishing spent reservations from unknown ones
    async fn reservation_amount(&self, address: &str, reservation_id: &str) -> Result<i64> {
        match self.ledger.amount_for_reservation(address, reservation_id).await {
            Err(WalletError::NotFound(msg)) => match self.ledger.reservation(address, reservation_id).await {
                Ok(row) if row.spent => Err(WalletError::AlreadySpent(reservation_id.to_string())),
                _ => Err(WalletError::NotFound(msg)),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{AddressUnspent, ExplorerError, MockBroadcaster, MockLedgerQuery, UnspentItem};
    use crate::monitor::MonitorConfig;
    use crate::storage::MemoryReservationStore;
    use bitcoin::consensus::encode::deserialize;
    use bitcoin::Network;

    const DEST: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const TXID_A: &str = "aa631d3cb0c98ada8ddb3ec82f23de2a948819e841a00ad740794837b7fbd7e9";
    const TXID_B: &str = "b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082";

    struct Fixture {
        signer: SingleKeySigner,
        source: String,
        monitor: Arc<UtxoMonitor>,
        ledger: ReserveLedger,
    }

    /// Source address holding two confirmed 1 BTC outputs
    async fn fixture() -> Fixture {
        let signer = SingleKeySigner::generate(Network::Bitcoin);
        let source = signer.address(Network::Bitcoin).to_string();
        let script_hex = hex::encode(signer.script_pubkey().as_bytes());

        let mut ledger_query = MockLedgerQuery::new();
        ledger_query.expect_unspent().returning(move |chunk: &[String]| {
            Ok(chunk
                .iter()
                .map(|address| AddressUnspent {
                    address: address.clone(),
                    unspent: [TXID_A, TXID_B]
                        .iter()
                        .map(|tx| UnspentItem {
                            tx: tx.to_string(),
                            amount: "1.00000000".to_string(),
                            vout: 0,
                            confirmations: 4,
                            script: script_hex.clone(),
                        })
                        .collect(),
                })
                .collect())
        });

        let monitor = Arc::new(UtxoMonitor::new(MonitorConfig::default(), Arc::new(ledger_query)));
        monitor.register_addresses(vec![source.clone()]).await;
        monitor.refresh_balances().await.unwrap();

        Fixture {
            signer,
            source,
            monitor,
            ledger: ReserveLedger::new(Arc::new(MemoryReservationStore::new())),
        }
    }

    fn manager(f: &Fixture, broadcaster: MockBroadcaster) -> TransactionManager {
        TransactionManager::new(
            f.monitor.clone(),
            f.ledger.clone(),
            Arc::new(broadcaster),
            TxBuilder::new_mainnet(),
        )
    }

    #[tokio::test]
    async fn test_spend_end_to_end() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 120_000_000).await.unwrap();

        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_broadcast().times(1).returning(|tx_hex: &str| {
            let bytes = hex::decode(tx_hex).unwrap();
            let tx: Transaction = deserialize(&bytes).unwrap();
            Ok(tx.compute_txid().to_string())
        });
        let manager = manager(&f, broadcaster);
        let key = *f.signer.private_key();

        let bytes = manager
            .build_transaction(&f.source, &id, &key, DEST)
            .await
            .unwrap();
        let tx: Transaction = deserialize(&bytes).unwrap();
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.output[0].value.to_sat(), 120_000_000 - 20_400);
        assert_eq!(tx.output[1].value.to_sat(), 80_000_000);
        assert_eq!(tx.output[1].script_pubkey, f.signer.script_pubkey());
        assert!(tx.input.iter().all(|input| !input.script_sig.is_empty()));

        let reference = manager
            .spend_reservation(&f.source, &id, &key, DEST)
            .await
            .unwrap();
        assert_eq!(reference, tx.compute_txid().to_string());
        assert!(f.ledger.reservation(&f.source, &id).await.unwrap().spent);

        let second = manager.spend_reservation(&f.source, &id, &key, DEST).await;
        assert!(matches!(second, Err(WalletError::AlreadySpent(_))));
    }

    #[tokio::test]
    async fn test_broadcast_failure_leaves_reservation_unspent() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 9_000_000).await.unwrap();

        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_broadcast()
            .times(2)
            .returning(|_: &str| Err(ExplorerError::Rejected("Did you sign your transaction?".to_string())));
        let manager = manager(&f, broadcaster);
        let key = *f.signer.private_key();

        for _ in 0..2 {
            let err = manager
                .spend_reservation(&f.source, &id, &key, DEST)
                .await
                .unwrap_err();
            assert!(matches!(err, WalletError::BroadcastRejected(_)));
            assert!(err.is_retryable());
        }

        assert_eq!(
            f.ledger.amount_for_reservation(&f.source, &id).await.unwrap(),
            9_000_000
        );
    }

    #[tokio::test]
    async fn test_ambiguous_broadcast_is_not_committed() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 9_000_000).await.unwrap();

        let mut broadcaster = MockBroadcaster::new();
        broadcaster
            .expect_broadcast()
            .returning(|_: &str| Err(ExplorerError::Ambiguous("gateway timeout".to_string())));
        let manager = manager(&f, broadcaster);

        let err = manager
            .spend_reservation(&f.source, &id, f.signer.private_key(), DEST)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::UpstreamUnavailable(_)));
        assert!(!f.ledger.reservation(&f.source, &id).await.unwrap().spent);
    }

    #[tokio::test]
    async fn test_single_input_selected_for_small_reservation() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 9_000_000).await.unwrap();
        let manager = manager(&f, MockBroadcaster::new());

        let bytes = manager
            .build_transaction(&f.source, &id, f.signer.private_key(), DEST)
            .await
            .unwrap();
        let tx: Transaction = deserialize(&bytes).unwrap();

        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output[0].value.to_sat(), 9_000_000 - 20_400);
        assert_eq!(tx.output[1].value.to_sat(), 91_000_000);
    }

    #[tokio::test]
    async fn test_fee_exceeds_amount() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 20_000).await.unwrap();
        let manager = manager(&f, MockBroadcaster::new());

        let err = manager
            .spend_reservation(&f.source, &id, f.signer.private_key(), DEST)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::FeeExceedsAmount {
                amount: 20_000,
                fee: 20_400
            }
        ));
        assert!(!f.ledger.reservation(&f.source, &id).await.unwrap().spent);
    }

    #[tokio::test]
    async fn test_unknown_reservation() {
        let f = fixture().await;
        let manager = manager(&f, MockBroadcaster::new());

        let err = manager
            .spend_reservation(&f.source, "missing", f.signer.private_key(), DEST)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_over_reserved_address_rejected_at_spend_time() {
        let f = fixture().await;
        // Reservations written straight to the ledger bypass the creation-time check.
        let id = f.ledger.create_reservation(&f.source, 150_000_000).await.unwrap();
        f.ledger.create_reservation(&f.source, 100_000_000).await.unwrap();
        let manager = manager(&f, MockBroadcaster::new());

        let err = manager
            .spend_reservation(&f.source, &id, f.signer.private_key(), DEST)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds {
                required: 250_000_000,
                available: 200_000_000
            }
        ));
    }

    #[tokio::test]
    async fn test_wrong_key_fails_signing() {
        let f = fixture().await;
        let id = f.ledger.create_reservation(&f.source, 9_000_000).await.unwrap();
        let manager = manager(&f, MockBroadcaster::new());
        let stranger = SingleKeySigner::generate(Network::Bitcoin);

        let err = manager
            .spend_reservation(&f.source, &id, stranger.private_key(), DEST)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }
}
