//! Execution context: scheduler, decision listener and the single loop
//! that owns all mutable runtime state.
//!
//! The loop is one tokio task. It starts at most one pipeline run at a
//! time, drops ticks that arrive while a run is in flight, and handles
//! decision events to completion in arrival order. Blocking work never
//! runs on it; every store, source and external stage call goes through
//! the offload pool, which makes those awaits yield points.

mod config;
mod context;
mod handle;
mod syndication;
mod types;

pub use config::OrchestratorConfig;
pub use context::Orchestrator;
pub use handle::OrchestratorHandle;
pub use syndication::Syndication;
pub use types::{
    DecisionEnvelope, ExecutionContext, OrchestratorError, OrchestratorStatus, RunSummary,
    SchedulerState,
};
