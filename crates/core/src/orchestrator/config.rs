//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;

/// Runtime settings for the execution context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// When disabled, no runs are scheduled. Decisions are still handled.
    pub enabled: bool,

    /// Time between scheduler ticks.
    pub interval: Duration,

    /// Fire the first tick immediately instead of after one interval.
    pub run_on_start: bool,

    /// Capacity of the decision queue.
    pub decision_buffer: usize,
}

fn default_decision_buffer() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for OrchestratorConfig {
    fn from(scheduler: &SchedulerConfig) -> Self {
        Self {
            enabled: scheduler.enabled,
            interval: Duration::from_secs(scheduler.interval_secs),
            run_on_start: scheduler.run_on_start,
            decision_buffer: default_decision_buffer(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}
