//! UTXO Monitor Service
//!
//! Owns the balance snapshot and the background refresh loop. Readers take
//! the snapshot handle under a shared lock; a refresh fetches every chunk
//! without holding any lock and publishes the finished snapshot with a
//! single pointer swap.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::discovery::AddressSource;
use super::snapshot::BalanceSnapshot;
use crate::common::config::MAX_BATCH_SIZE;
use crate::common::{log_refresh_event, Result, TelepathConfig, WalletError};
use crate::explorer::LedgerQuery;
use crate::types::InputSelection;

/// Shortest refresh period the loop will tick at
const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(1);

/// Monitor timing and batching
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Balance refresh period
    pub balance_refresh: Duration,
    /// Address discovery period
    pub address_refresh: Duration,
    /// How far back an observation keeps an address monitored
    pub discovery_window: Duration,
    /// Addresses per ledger-query call
    pub batch_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            balance_refresh: Duration::from_secs(3),
            address_refresh: Duration::from_secs(5),
            discovery_window: Duration::from_secs(24 * 60 * 60),
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl From<&TelepathConfig> for MonitorConfig {
    fn from(config: &TelepathConfig) -> Self {
        Self {
            balance_refresh: config.balance_refresh,
            address_refresh: config.address_refresh,
            discovery_window: config.discovery_window,
            batch_size: config.batch_size,
        }
    }
}

/// Outcome of one completed balance refresh
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    pub addresses: usize,
    pub batches: usize,
    pub outputs: usize,
    pub duration_ms: u64,
}

impl fmt::Display for RefreshResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addresses={}, batches={}, outputs={}, {}ms",
            self.addresses, self.batches, self.outputs, self.duration_ms
        )
    }
}

/// UTXO monitor
pub struct UtxoMonitor {
    config: MonitorConfig,

    /// Ledger-query backend
    ledger: Arc<dyn LedgerQuery>,

    /// Discovery backend (None = addresses are registered manually)
    source: Option<Arc<dyn AddressSource>>,

    /// Addresses to include in the next refresh
    addresses: RwLock<Vec<String>>,

    /// Latest published snapshot
    snapshot: RwLock<Arc<BalanceSnapshot>>,

    /// Running flag; `stop` clears it and wakes the loop
    running: watch::Sender<bool>,
}

impl UtxoMonitor {
    /// Create a monitor with manual address registration only
    pub fn new(config: MonitorConfig, ledger: Arc<dyn LedgerQuery>) -> Self {
        Self {
            config,
            ledger,
            source: None,
            addresses: RwLock::new(Vec::new()),
            snapshot: RwLock::new(Arc::new(BalanceSnapshot::default())),
            running: watch::channel(false).0,
        }
    }

    /// Attach an address discovery source
    pub fn with_address_source(mut self, source: Arc<dyn AddressSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the monitored list; takes effect on the next refresh
    pub async fn register_addresses(&self, addresses: Vec<String>) {
        let mut current = self.addresses.write().await;
        *current = addresses;
    }

    /// Currently monitored addresses
    pub async fn addresses(&self) -> Vec<String> {
        self.addresses.read().await.clone()
    }

    /// Handle to the latest published snapshot
    pub async fn snapshot(&self) -> Arc<BalanceSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Confirmed balance of an address
    pub async fn get_balance(&self, address: &str) -> Result<i64> {
        self.snapshot()
            .await
            .get(address)
            .map(|entry| entry.balance)
            .ok_or_else(|| WalletError::not_found(format!("address {}", address)))
    }

    /// Greedy input selection against the latest snapshot
    pub async fn select_inputs(&self, address: &str, target: i64) -> InputSelection {
        self.snapshot().await.select_inputs(address, target)
    }

    /// Rebuild the snapshot from the explorer.
    ///
    /// Every chunk must succeed; otherwise the previous snapshot stays
    /// published and the error is returned.
    pub async fn refresh_balances(&self) -> Result<RefreshResult> {
        let start = Instant::now();
        let addresses = self.addresses().await;
        let batch_size = self.config.batch_size.clamp(1, MAX_BATCH_SIZE);

        match self.fetch_snapshot(&addresses, batch_size).await {
            Ok((snapshot, batches)) => {
                let outputs = addresses
                    .iter()
                    .filter_map(|a| snapshot.get(a))
                    .map(|entry| entry.unspent.len())
                    .sum();

                {
                    let mut current = self.snapshot.write().await;
                    *current = Arc::new(snapshot);
                }

                let result = RefreshResult {
                    addresses: addresses.len(),
                    batches,
                    outputs,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                log_refresh_event(result.addresses, result.batches, result.duration_ms, None);

                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                log_refresh_event(
                    addresses.len(),
                    0,
                    start.elapsed().as_millis() as u64,
                    Some(&message),
                );
                Err(e)
            }
        }
    }

    async fn fetch_snapshot(
        &self,
        addresses: &[String],
        batch_size: usize,
    ) -> Result<(BalanceSnapshot, usize)> {
        let mut entries = Vec::with_capacity(addresses.len());
        let mut batches = 0;

        for chunk in addresses.chunks(batch_size) {
            entries.extend(self.ledger.unspent(chunk).await?);
            batches += 1;
        }

        let snapshot = BalanceSnapshot::from_explorer(entries, chrono::Utc::now().timestamp())?;
        Ok((snapshot, batches))
    }

    /// Replace the monitored list from the discovery source.
    ///
    /// Returns the number of addresses now monitored, or `None` when no
    /// source is attached.
    pub async fn discover_addresses(&self) -> Result<Option<usize>> {
        let source = match &self.source {
            Some(source) => source,
            None => return Ok(None),
        };

        let now = chrono::Utc::now().timestamp();
        let discovered = source
            .active_addresses(now, self.config.discovery_window)
            .await?;
        let count = discovered.len();

        tracing::debug!(target: "telepath::monitor", count, "discovered addresses");
        self.register_addresses(discovered).await;

        Ok(Some(count))
    }

    /// Run the refresh loop until `stop` is called
    pub async fn run(&self) {
        self.running.send_replace(true);
        self.run_loop().await;
    }

    async fn run_loop(&self) {
        let mut running = self.running.subscribe();

        let balance_period = refresh_period(self.config.balance_refresh, "balance_refresh");
        let address_period = refresh_period(self.config.address_refresh, "address_refresh");

        tracing::info!(
            target: "telepath::monitor",
            balance_refresh_ms = balance_period.as_millis() as u64,
            address_refresh_ms = address_period.as_millis() as u64,
            discovery = self.source.is_some(),
            "monitor started"
        );

        let mut balance_tick = interval(balance_period);
        let mut address_tick = interval(address_period);
        balance_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        address_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while *running.borrow_and_update() {
            // Stop requests first, then discovery, so the first refresh already sees the discovered list.
            tokio::select! {
                biased;

                _ = running.changed() => {}
                _ = address_tick.tick() => {
                    if let Err(e) = self.discover_addresses().await {
                        tracing::warn!(target: "telepath::monitor", error = %e, "address discovery failed");
                    }
                }
                _ = balance_tick.tick() => {
                    match self.refresh_balances().await {
                        Ok(result) => {
                            tracing::debug!(target: "telepath::monitor", "[refresh] {}", result);
                        }
                        Err(e) => {
                            tracing::warn!(target: "telepath::monitor", error = %e, "balance refresh aborted");
                        }
                    }
                }
            }
        }

        tracing::info!(target: "telepath::monitor", "monitor stopped");
    }

    /// Run the loop on the tokio runtime.
    ///
    /// The monitor counts as running from this call on, so a `stop` issued
    /// before the task is first polled still ends it.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        self.running.send_replace(true);
        tokio::spawn(async move { self.run_loop().await })
    }

    /// Stop the loop; an in-flight refresh or discovery finishes first
    pub async fn stop(&self) {
        self.running.send_replace(false);
    }

    /// Whether the loop is running
    pub async fn is_running(&self) -> bool {
        *self.running.borrow()
    }
}

fn refresh_period(period: Duration, name: &str) -> Duration {
    if period < MIN_REFRESH_PERIOD {
        tracing::warn!(
            target: "telepath::monitor",
            setting = name,
            "refresh period below {}ms, clamping",
            MIN_REFRESH_PERIOD.as_millis()
        );
        return MIN_REFRESH_PERIOD;
    }
    period
}
