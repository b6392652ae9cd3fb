//! Periodic cleanup task.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::eviction::CleanupTrigger;
use crate::cache::manager::CacheInner;

pub(crate) struct CleanupScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawns the interval task. It holds only a weak handle to the cache,
    /// so a cache dropped without `shutdown` stops the task on its next tick
    /// instead of being kept alive by it.
    pub(crate) fn start(inner: Weak<CacheInner>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval fires immediately; the first cleanup should wait a
            // full period.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(cache) = inner.upgrade() else { break };
                        let result = cache.run_cleanup(CleanupTrigger::Scheduled).await;
                        debug!(
                            expired = result.expired_removed,
                            lru = result.lru_removed,
                            bytes_freed = result.bytes_freed,
                            "scheduled cleanup pass finished"
                        );
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signals the task and waits for it to exit. Idempotent.
    pub(crate) async fn stop(&mut self) {
        self.shutdown_tx.send(true).ok();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
