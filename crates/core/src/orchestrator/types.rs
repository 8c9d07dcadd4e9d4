//! Types for the execution context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::approval::{ApprovalCache, DecisionEvent, Resolution, ResolveError};
use crate::offload::PoolStatus;
use crate::pipeline::RunReport;
use crate::stage::StageDescriptor;

/// Errors from talking to the execution context.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestratorError {
    /// The loop has exited.
    #[error("orchestrator is not running")]
    Stopped,

    /// The decision was accepted but no outcome came back (the handler crashed).
    #[error("decision was accepted but not answered")]
    NoReply,
}

/// Scheduler state. Only the execution context changes it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Running { started_at: DateTime<Utc> },
}

impl SchedulerState {
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running { .. })
    }
}

/// A decision event plus an optional reply slot for its outcome.
#[derive(Debug)]
pub struct DecisionEnvelope {
    pub event: DecisionEvent,
    pub reply: Option<oneshot::Sender<Result<Resolution, ResolveError>>>,
}

/// Aggregate of one scheduled run over every source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: usize,
    pub source_failures: usize,
    pub fetched: usize,
    pub awaiting: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            ..Self::default()
        }
    }

    pub fn add_report(&mut self, report: &RunReport) {
        self.sources += 1;
        self.fetched += report.fetched;
        self.awaiting += report.awaiting.len();
        self.skipped += report.skipped;
        self.failed += report.failed;
    }

    pub fn add_source_failure(&mut self) {
        self.sources += 1;
        self.source_failures += 1;
    }
}

/// State owned by the loop. Returned when the loop exits.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub scheduler: SchedulerState,
    pub cache: ApprovalCache,
    pub ticks_started: u64,
    pub ticks_dropped: u64,
    pub runs_completed: u64,
    pub decisions_handled: u64,
    pub crashes: u64,
    pub last_run: Option<RunSummary>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Snapshot of the execution context for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorStatus {
    pub scheduler_enabled: bool,
    pub interval_secs: u64,
    pub scheduler: SchedulerState,
    pub cached_approvals: usize,
    pub ticks_started: u64,
    pub ticks_dropped: u64,
    pub runs_completed: u64,
    pub decisions_handled: u64,
    pub crashes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunSummary>,
    pub sources: Vec<String>,
    pub stages: Vec<StageDescriptor>,
    pub offload: PoolStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_state_serialization() {
        let json = serde_json::to_value(SchedulerState::Idle).unwrap();
        assert_eq!(json["state"], "idle");

        let running = SchedulerState::Running {
            started_at: Utc::now(),
        };
        let json = serde_json::to_value(running).unwrap();
        assert_eq!(json["state"], "running");
        assert!(json["started_at"].is_string());
        assert!(running.is_running());
    }

    #[test]
    fn test_run_summary_accumulates() {
        let mut summary = RunSummary::new(Utc::now());
        let mut report = RunReport::new("a", 3);
        report.skipped = 1;
        report.failed = 1;
        summary.add_report(&report);
        summary.add_source_failure();

        assert_eq!(summary.sources, 2);
        assert_eq!(summary.source_failures, 1);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.awaiting, 0);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrchestratorError::Stopped.to_string(),
            "orchestrator is not running"
        );
    }
}
