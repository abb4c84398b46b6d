//! Address Discovery
//!
//! The monitored address list is rebuilt from a recency-scored set of
//! addresses the front-end has observed. Anything seen inside the discovery
//! window is monitored; older addresses drop out on the next pass.

use async_trait::async_trait;
use std::time::Duration;

use crate::storage::{SeenAddressStore, StorageResult};

/// Source of addresses that should currently be monitored
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Addresses observed within `window` of `now` (unix seconds)
    async fn active_addresses(&self, now: i64, window: Duration) -> StorageResult<Vec<String>>;
}

#[async_trait]
impl<T: SeenAddressStore> AddressSource for T {
    async fn active_addresses(&self, now: i64, window: Duration) -> StorageResult<Vec<String>> {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        self.seen_between(now.saturating_sub(window_secs), now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySeenAddresses;

    #[tokio::test]
    async fn test_window_excludes_stale_addresses() {
        let seen = MemorySeenAddresses::new();
        let now = 1_700_000_000;
        seen.record_seen("fresh", now - 60).await.unwrap();
        seen.record_seen("edge", now - 86_400).await.unwrap();
        seen.record_seen("stale", now - 86_401).await.unwrap();

        let active = seen
            .active_addresses(now, Duration::from_secs(86_400))
            .await
            .unwrap();

        assert_eq!(active, vec!["edge", "fresh"]);
    }
}
