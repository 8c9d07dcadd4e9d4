//! Offload pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the offload pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadConfig {
    /// Maximum number of blocking calls in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Slots reserved for durable store calls. Stage calls never take them.
    #[serde(default = "default_store_slots")]
    pub store_slots: usize,

    /// Per-call timeout (milliseconds).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_store_slots() -> usize {
    2
}

fn default_call_timeout() -> u64 {
    120_000 // 2 minutes
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            store_slots: default_store_slots(),
            call_timeout_ms: default_call_timeout(),
        }
    }
}

impl OffloadConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Sets the concurrency bound.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_store_slots(mut self, slots: usize) -> Self {
        self.store_slots = slots;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
