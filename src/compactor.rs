use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::PoolStore;

/// Background task that rewrites the WAL from live state once enough appends
/// have accumulated since the last compaction.
pub async fn run_compactor(store: Arc<PoolStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = store.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}
