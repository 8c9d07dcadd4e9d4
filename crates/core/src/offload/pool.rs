//! Offload pool implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::metrics;
use crate::stage::StageError;

use super::config::OffloadConfig;

/// Error type for offloaded calls.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum OffloadError {
    /// The call exceeded the per-call timeout. It keeps running in the
    /// background until it finishes on its own.
    #[error("'{label}' timed out after {}s", .after.as_secs_f64())]
    Timeout { label: String, after: Duration },

    /// The blocking call panicked.
    #[error("'{label}' panicked: {message}")]
    Panicked { label: String, message: String },

    /// The pool was closed.
    #[error("offload pool is closed")]
    Closed,
}

impl From<OffloadError> for StageError {
    fn from(err: OffloadError) -> Self {
        match err {
            OffloadError::Timeout { label, after } => StageError::Timeout {
                stage: label,
                after,
            },
            OffloadError::Panicked { label, message } => StageError::Failed {
                stage: label,
                message: format!("panicked: {}", message),
            },
            OffloadError::Closed => StageError::failed("offload", "offload pool is closed"),
        }
    }
}

/// Status of the offload pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum concurrent stage calls.
    pub max_concurrent: usize,
    /// Maximum concurrent store calls.
    pub store_slots: usize,
    /// Calls currently running on a blocking thread.
    pub active: usize,
    /// Calls waiting for a free slot.
    pub waiting: usize,
    /// Calls that returned a value.
    pub total_completed: u64,
    /// Calls that panicked.
    pub total_failed: u64,
    /// Calls that exceeded the timeout.
    pub total_timed_out: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    waiting: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
    total_timed_out: AtomicU64,
}

/// Decrements a gauge when dropped.
struct GaugeGuard<'a>(&'a AtomicU64);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Holds a concurrency slot for as long as the blocking call runs.
struct ActiveSlot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<PoolStats>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Bounded pool for running blocking calls off the execution context.
///
/// Store calls run in their own lane, so a decision never queues behind
/// slow stage calls. Cheap to clone; clones share the same bounds and
/// statistics.
#[derive(Clone)]
pub struct OffloadPool {
    config: OffloadConfig,
    semaphore: Arc<Semaphore>,
    store_semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl OffloadPool {
    /// Creates a new pool. Bounds of 0 are treated as 1.
    pub fn new(config: OffloadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let store_semaphore = Arc::new(Semaphore::new(config.store_slots.max(1)));
        Self {
            config,
            semaphore,
            store_semaphore,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Run a blocking call on a worker thread and await its result.
    ///
    /// Waits for a free slot first. No ordering is guaranteed between
    /// concurrent calls. On timeout the call is not aborted: its slot stays
    /// taken until the blocking thread actually returns.
    pub async fn offload<T, F>(&self, label: &str, call: F) -> Result<T, OffloadError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_in(&self.semaphore, label, call).await
    }

    /// Like [`offload`](Self::offload), but in the store lane.
    pub async fn offload_store<T, F>(&self, label: &str, call: F) -> Result<T, OffloadError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_in(&self.store_semaphore, label, call).await
    }

    async fn run_in<T, F>(
        &self,
        lane: &Arc<Semaphore>,
        label: &str,
        call: F,
    ) -> Result<T, OffloadError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = {
            self.stats.waiting.fetch_add(1, Ordering::Relaxed);
            let _waiting = GaugeGuard(&self.stats.waiting);
            Arc::clone(lane)
                .acquire_owned()
                .await
                .map_err(|_| OffloadError::Closed)?
        };

        self.stats.active.fetch_add(1, Ordering::Relaxed);
        let slot = ActiveSlot {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        };

        debug!(label, "Offloading blocking call");
        let handle = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            call()
        });

        let after = self.config.call_timeout();
        match tokio::time::timeout(after, handle).await {
            Ok(Ok(value)) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                metrics::OFFLOAD_CALLS.with_label_values(&["ok"]).inc();
                Ok(value)
            }
            Ok(Err(join_err)) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                metrics::OFFLOAD_CALLS.with_label_values(&["panicked"]).inc();
                let message = panic_message(join_err);
                warn!(label, error = %message, "Offloaded call panicked");
                Err(OffloadError::Panicked {
                    label: label.to_string(),
                    message,
                })
            }
            Err(_) => {
                self.stats.total_timed_out.fetch_add(1, Ordering::Relaxed);
                metrics::OFFLOAD_CALLS.with_label_values(&["timeout"]).inc();
                warn!(label, timeout_ms = after.as_millis() as u64, "Offloaded call timed out");
                Err(OffloadError::Timeout {
                    label: label.to_string(),
                    after,
                })
            }
        }
    }

    /// Returns the current pool status.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_concurrent: self.config.max_concurrent.max(1),
            store_slots: self.config.store_slots.max(1),
            active: self.stats.active.load(Ordering::Relaxed) as usize,
            waiting: self.stats.waiting.load(Ordering::Relaxed) as usize,
            total_completed: self.stats.total_completed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
            total_timed_out: self.stats.total_timed_out.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting new calls. In-flight calls run to completion.
    pub fn close(&self) {
        self.semaphore.close();
        self.store_semaphore.close();
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "task cancelled".to_string();
    }
    describe_panic(err.into_panic().as_ref())
}

/// Best-effort text of a panic payload.
pub(crate) fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn pool(max: usize, timeout_ms: u64) -> OffloadPool {
        OffloadPool::new(
            OffloadConfig::default()
                .with_max_concurrent(max)
                .with_call_timeout(Duration::from_millis(timeout_ms)),
        )
    }

    #[tokio::test]
    async fn test_offload_returns_value() {
        let pool = pool(2, 1000);
        let value = pool.offload("add", || 2 + 2).await.unwrap();
        assert_eq!(value, 4);
        assert_eq!(pool.status().total_completed, 1);
        assert_eq!(pool.status().active, 0);
    }

    #[tokio::test]
    async fn test_offload_timeout() {
        let pool = pool(1, 50);
        let result = pool
            .offload("slow", || std::thread::sleep(Duration::from_millis(300)))
            .await;

        assert!(matches!(result, Err(OffloadError::Timeout { ref label, .. }) if label == "slow"));
        assert_eq!(pool.status().total_timed_out, 1);

        let stage_err: StageError = result.unwrap_err().into();
        assert!(stage_err.is_timeout());
        assert_eq!(stage_err.stage_name(), "slow");
    }

    #[tokio::test]
    async fn test_timed_out_call_keeps_its_slot() {
        let pool = pool(1, 30);
        let _ = pool
            .offload("slow", || std::thread::sleep(Duration::from_millis(200)))
            .await;

        // The slow call is still running, so this one waits for its slot.
        // Waiting for a slot does not count against the call timeout.
        let start = Instant::now();
        pool.offload("next", || ()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_store_lane_ignores_busy_stage_slots() {
        let pool = pool(1, 30);
        let _ = pool
            .offload("slow", || std::thread::sleep(Duration::from_millis(500)))
            .await;
        assert_eq!(pool.status().active, 1);

        let start = Instant::now();
        let value = pool.offload_store("get", || 7).await.unwrap();
        assert_eq!(value, 7);
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_offload_panic_is_contained() {
        let pool = pool(1, 1000);
        let result: Result<(), _> = pool.offload("boom", || panic!("stage exploded")).await;

        match result {
            Err(OffloadError::Panicked { label, message }) => {
                assert_eq!(label, "boom");
                assert!(message.contains("stage exploded"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(pool.status().total_failed, 1);
        assert_eq!(pool.status().active, 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = pool(2, 5000);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut calls = Vec::new();
        for i in 0..6 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            calls.push(tokio::spawn(async move {
                pool.offload(&format!("call-{}", i), move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.status().total_completed, 6);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_calls() {
        let pool = pool(1, 1000);
        pool.close();
        let result = pool.offload("late", || 1).await;
        assert_eq!(result, Err(OffloadError::Closed));
    }
}
