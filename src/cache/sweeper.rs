//! Background TTL sweeper
//!
//! Periodically removes expired entries in bounded batches so a pass never
//! holds the store lock longer than one fixed slice.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::store::CacheStore;

/// Spawn the sweep loop. The returned handle finishes once `cancel` fires.
pub fn spawn_sweeper<V>(
    store: Arc<CacheStore<V>>,
    interval: Duration,
    batch: usize,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh store is
        // not swept before anything can expire.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cache sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep_expired(batch);
                    if removed > 0 {
                        debug!(removed, "cache sweep removed expired entries");
                    }
                }
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let store = Arc::new(CacheStore::new(100));
        for i in 0..20 {
            store
                .set(format!("k{i}"), i as u32, Duration::from_millis(10))
                .unwrap();
        }

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(
            store.clone(),
            Duration::from_millis(25),
            256,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let store: Arc<CacheStore<u32>> = Arc::new(CacheStore::new(10));
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(store, Duration::from_secs(3600), 256, cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly")
            .unwrap();
    }
}
