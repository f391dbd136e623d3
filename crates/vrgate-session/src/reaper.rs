//! Expired token sweeping
//!
//! A sweep walks a snapshot of the store and removes expired entries one by
//! one, so no lock is held across the whole scan. The same sweep runs on a
//! timer via [`ExpiryReaper::spawn`] and synchronously from the issuer when
//! collisions pile up.

use crate::clock::Clock;
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Entries examined between cooperative yields
const SWEEP_CHUNK: usize = 1024;

/// Default period between background sweeps
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Removes expired tokens from a store
#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn SessionStore>,
}

impl ExpiryReaper {
    /// Create a reaper over `store`
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Remove every entry whose expiry is at or before `now`.
    ///
    /// Returns the number of entries this call removed. Concurrent sweeps never
    /// double count: each entry is removed by exactly one caller.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let snapshot = self.store.snapshot_keys().await;
        let mut removed = 0;

        for (i, (code, expires_at)) in snapshot.iter().enumerate() {
            if i > 0 && i % SWEEP_CHUNK == 0 {
                tokio::task::yield_now().await;
            }
            if *expires_at > now {
                continue;
            }
            if self.store.remove_expired(code, now).await {
                removed += 1;
            }
        }

        debug!(scanned = snapshot.len(), removed, "sweep finished");
        removed
    }

    /// Start sweeping every `period` on the current tokio runtime
    pub fn spawn(&self, clock: Arc<dyn Clock>, period: Duration) -> ReaperHandle {
        let reaper = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let removed = reaper.sweep(clock.now()).await;
                        if removed > 0 {
                            info!("Reaped {} expired session(s)", removed);
                        }
                    }
                }
            }

            debug!("Reaper stopped");
        });

        info!("Reaper started, sweeping every {}s", period.as_secs());

        ReaperHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Running background reaper. Dropping the handle aborts the task.
pub struct ReaperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for it to finish its current sweep
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the background task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemorySessionStore;
    use crate::token::AccessToken;
    use chrono::Duration as TimeDelta;

    async fn seed(store: &InMemorySessionStore, code: &str, issued_at: DateTime<Utc>, ttl: TimeDelta) {
        store
            .insert(AccessToken::new(
                code.to_string(),
                "paris".to_string(),
                issued_at,
                ttl,
            )
            .unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = Arc::new(InMemorySessionStore::new());
        let now = Utc::now();

        seed(&store, "111111", now - TimeDelta::minutes(11), TimeDelta::minutes(10)).await;
        seed(&store, "222222", now, TimeDelta::minutes(10)).await;
        // Expires exactly now
        seed(&store, "333333", now - TimeDelta::minutes(10), TimeDelta::minutes(10)).await;

        let reaper = ExpiryReaper::new(store.clone());
        assert_eq!(reaper.sweep(now).await, 2);

        assert!(store.get("111111").await.is_none());
        assert!(store.get("333333").await.is_none());
        assert!(store.get("222222").await.is_some());

        // Idempotent
        assert_eq!(reaper.sweep(now).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_large_store() {
        let store = Arc::new(InMemorySessionStore::with_capacity(5000));
        let now = Utc::now();

        for i in 0..5000 {
            let issued_at = if i % 2 == 0 { now - TimeDelta::hours(1) } else { now };
            seed(&store, &format!("{:06}", i), issued_at, TimeDelta::minutes(10)).await;
        }

        let reaper = ExpiryReaper::new(store.clone());
        assert_eq!(reaper.sweep(now).await, 2500);
        assert_eq!(store.len().await, 2500);
        for (_, expires_at) in store.snapshot_keys().await {
            assert!(expires_at > now);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sweeps_remove_each_entry_once() {
        let store = Arc::new(InMemorySessionStore::new());
        let now = Utc::now();

        for i in 0..2000 {
            seed(&store, &format!("{:06}", i), now - TimeDelta::hours(1), TimeDelta::minutes(10)).await;
        }

        let reaper = ExpiryReaper::new(store.clone());
        let a = tokio::spawn({
            let reaper = reaper.clone();
            async move { reaper.sweep(now).await }
        });
        let b = tokio::spawn({
            let reaper = reaper.clone();
            async move { reaper.sweep(now).await }
        });

        let total = a.await.unwrap() + b.await.unwrap();
        assert_eq!(total, 2000);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_reaper_sweeps_on_interval() {
        let store = Arc::new(InMemorySessionStore::new());
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));

        seed(&store, "444444", start, TimeDelta::minutes(1)).await;
        seed(&store, "555555", start, TimeDelta::hours(1)).await;

        let reaper = ExpiryReaper::new(store.clone());
        let handle = reaper.spawn(clock.clone(), DEFAULT_REAP_INTERVAL);
        assert!(handle.is_running());

        clock.advance(TimeDelta::minutes(2));
        for _ in 0..10 {
            if store.len().await == 1 {
                break;
            }
            tokio::time::sleep(DEFAULT_REAP_INTERVAL).await;
        }

        assert!(store.get("444444").await.is_none());
        assert!(store.get("555555").await.is_some());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_reaper_leaves_store_alone() {
        let store = Arc::new(InMemorySessionStore::new());
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));

        seed(&store, "666666", start, TimeDelta::minutes(1)).await;

        let handle = ExpiryReaper::new(store.clone()).spawn(clock.clone(), DEFAULT_REAP_INTERVAL);
        handle.stop().await;

        clock.advance(TimeDelta::hours(1));
        tokio::time::sleep(DEFAULT_REAP_INTERVAL * 3).await;
        assert_eq!(store.len().await, 1);
    }
}
