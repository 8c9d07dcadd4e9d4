//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler (ticks started, ticks dropped, run duration)
//! - Pipeline (items by outcome)
//! - Approvals (resolutions by outcome)
//! - Offload pool (calls by result)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Scheduler ticks that started a pipeline run.
pub static TICKS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "newsroom_scheduler_ticks_started_total",
        "Scheduler ticks that started a pipeline run",
    )
    .unwrap()
});

/// Scheduler ticks dropped because a run was still in progress.
pub static TICKS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "newsroom_scheduler_ticks_dropped_total",
        "Scheduler ticks dropped while a run was in progress",
    )
    .unwrap()
});

/// Duration of a full pipeline run (all sources).
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "newsroom_pipeline_run_duration_seconds",
            "Duration of a scheduled pipeline run",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["result"], // "completed", "crashed"
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Items processed by outcome.
pub static ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_pipeline_items_total", "Items processed by outcome"),
        &["outcome"], // "awaiting_approval", "skipped", "failed"
    )
    .unwrap()
});

/// Source fetch failures.
pub static SOURCE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_source_failures_total", "Source fetch failures"),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Approval Metrics
// =============================================================================

/// Decision resolutions by outcome.
pub static RESOLUTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_resolutions_total", "Decision events resolved by outcome"),
        &["outcome"], // "published", "declined", "already_resolved", "not_found", "conflict", "store_error", "publish_error"
    )
    .unwrap()
});

/// Durable store retries.
pub static STORE_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_store_retries_total", "Durable store operation retries"),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Offload Metrics
// =============================================================================

/// Offloaded calls by result.
pub static OFFLOAD_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_offload_calls_total", "Offloaded blocking calls by result"),
        &["result"], // "ok", "timeout", "panicked"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(TICKS_STARTED.clone()),
        Box::new(TICKS_DROPPED.clone()),
        Box::new(RUN_DURATION.clone()),
        // Pipeline
        Box::new(ITEMS_TOTAL.clone()),
        Box::new(SOURCE_FAILURES.clone()),
        // Approvals
        Box::new(RESOLUTIONS_TOTAL.clone()),
        Box::new(STORE_RETRIES.clone()),
        // Offload
        Box::new(OFFLOAD_CALLS.clone()),
    ]
}
