//! Wallet Facade
//!
//! The balance, reserve and spend operations an API layer exposes, composed
//! from the monitor, the reserve ledger and the transaction manager.

use std::sync::Arc;

use bitcoin::key::PrivateKey;

use crate::common::{Result, TelepathConfig, WalletError};
use crate::explorer::ExplorerClient;
use crate::ledger::ReserveLedger;
use crate::monitor::{MonitorConfig, UtxoMonitor};
use crate::storage::{SeenAddressStore, SqliteReservationStore, SqliteSeenAddresses};
use crate::transaction::TransactionManager;
use crate::types::{
    BalanceResponse, ReserveRequest, ReserveResponse, SpendRequest, SpendResponse,
};

/// Custodial wallet core
pub struct Wallet {
    monitor: Arc<UtxoMonitor>,
    ledger: ReserveLedger,
    transactions: TransactionManager,
    seen: Option<Arc<dyn SeenAddressStore>>,
}

impl Wallet {
    pub fn new(
        monitor: Arc<UtxoMonitor>,
        ledger: ReserveLedger,
        transactions: TransactionManager,
    ) -> Self {
        Self {
            monitor,
            ledger,
            transactions,
            seen: None,
        }
    }

    /// Attach the seen-address store used by `record_seen`
    pub fn with_seen_store(mut self, seen: Arc<dyn SeenAddressStore>) -> Self {
        self.seen = Some(seen);
        self
    }

    /// Wire up explorer, SQLite stores, monitor and transaction manager from configuration
    pub fn from_config(config: &TelepathConfig) -> Result<Self> {
        let explorer = Arc::new(ExplorerClient::from_config(config)?);

        let reservations = Arc::new(SqliteReservationStore::new(&config.reserve_db)?);
        let seen = Arc::new(SqliteSeenAddresses::new(&config.seen_db)?);

        let monitor = Arc::new(
            UtxoMonitor::new(MonitorConfig::from(config), explorer.clone())
                .with_address_source(seen.clone()),
        );
        let ledger = ReserveLedger::new(reservations);
        let transactions =
            TransactionManager::from_config(config, monitor.clone(), ledger.clone(), explorer);

        Ok(Self::new(monitor, ledger, transactions).with_seen_store(seen))
    }

    pub fn monitor(&self) -> &Arc<UtxoMonitor> {
        &self.monitor
    }

    pub fn ledger(&self) -> &ReserveLedger {
        &self.ledger
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Balance net of open reservations
    pub async fn balance(&self, address: &str) -> Result<BalanceResponse> {
        let balance = self.monitor.get_balance(address).await?;
        let reserved = self.ledger.total_reserved(address).await?;

        Ok(BalanceResponse {
            address: address.to_string(),
            available_to_spend: balance - reserved,
            reserved,
        })
    }

    /// Reserve funds, rejecting anything above the currently available amount
    pub async fn reserve(&self, address: &str, request: &ReserveRequest) -> Result<ReserveResponse> {
        if request.amount <= 0 {
            return Err(WalletError::validation(format!(
                "reservation amount must be positive, got {}",
                request.amount
            )));
        }

        let available = self.balance(address).await?.available_to_spend;
        if request.amount > available {
            return Err(WalletError::InsufficientFunds {
                required: request.amount,
                available,
            });
        }

        let reservation_id = self.ledger.create_reservation(address, request.amount).await?;
        Ok(ReserveResponse { reservation_id })
    }

    /// Spend a reservation to the requested destination
    pub async fn spend(
        &self,
        address: &str,
        reservation_id: &str,
        request: &SpendRequest,
        key: &PrivateKey,
    ) -> Result<SpendResponse> {
        let transaction_identifier = self
            .transactions
            .spend_reservation(address, reservation_id, key, &request.destination_account)
            .await?;

        Ok(SpendResponse {
            transaction_identifier,
        })
    }

    /// Mark an address as seen now so discovery starts monitoring it
    pub async fn record_seen(&self, address: &str) -> Result<()> {
        let seen = self
            .seen
            .as_ref()
            .ok_or_else(|| WalletError::validation("no seen-address store configured"))?;
        seen.record_seen(address, chrono::Utc::now().timestamp())
            .await?;
        Ok(())
    }
}
