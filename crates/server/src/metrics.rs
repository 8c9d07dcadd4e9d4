//! Prometheus metrics for the HTTP surface.
//!
//! Request metrics are recorded by middleware. Approval counts, scheduler
//! state and offload pool occupancy are gauges refreshed on every scrape.
//! Counters owned by the core crate are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use newsroom_core::{ApprovalFilter, ApprovalStatus};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "newsroom_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("newsroom_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Dynamic gauges (refreshed per scrape)
// =============================================================================

/// Durable approval records by status.
pub static APPROVALS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("newsroom_approvals_by_status", "Approval records by status"),
        &["status"],
    )
    .unwrap()
});

/// Records held by the in-process approval cache.
pub static CACHED_APPROVALS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_cached_approvals",
        "Records held by the in-process approval cache",
    )
    .unwrap()
});

/// 1 while a pipeline run is in flight.
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_scheduler_running",
        "Whether a pipeline run is in progress (1) or idle (0)",
    )
    .unwrap()
});

/// 1 while the execution context answers status requests.
pub static ORCHESTRATOR_UP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_orchestrator_up",
        "Whether the execution context is running (1) or stopped (0)",
    )
    .unwrap()
});

pub static OFFLOAD_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_offload_active",
        "Blocking calls currently running on the offload pool",
    )
    .unwrap()
});

pub static OFFLOAD_WAITING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "newsroom_offload_waiting",
        "Blocking calls waiting for an offload slot",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Dynamic
    registry
        .register(Box::new(APPROVALS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(CACHED_APPROVALS.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_UP.clone()))
        .unwrap();
    registry
        .register(Box::new(OFFLOAD_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(OFFLOAD_WAITING.clone()))
        .unwrap();

    // Core metrics (scheduler, pipeline, resolver, offload pool)
    for metric in newsroom_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh the dynamic gauges from current application state.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let pool_status = state.pool().status();
    OFFLOAD_ACTIVE.set(pool_status.active as i64);
    OFFLOAD_WAITING.set(pool_status.waiting as i64);

    match state.orchestrator().status().await {
        Ok(status) => {
            ORCHESTRATOR_UP.set(1);
            SCHEDULER_RUNNING.set(i64::from(status.scheduler.is_running()));
            CACHED_APPROVALS.set(status.cached_approvals as i64);
        }
        Err(_) => {
            ORCHESTRATOR_UP.set(0);
            SCHEDULER_RUNNING.set(0);
        }
    }

    let store = state.store();
    let counts = state
        .pool()
        .offload_store("metrics.count", move || {
            [
                ApprovalStatus::Pending,
                ApprovalStatus::Approved,
                ApprovalStatus::Declined,
            ]
            .into_iter()
            .map(|status| {
                let filter = ApprovalFilter::new().with_status(status);
                (status, store.count(&filter))
            })
            .collect::<Vec<_>>()
        })
        .await;

    match counts {
        Ok(counts) => {
            for (status, count) in counts {
                match count {
                    Ok(count) => APPROVALS_BY_STATUS
                        .with_label_values(&[status.as_str()])
                        .set(count),
                    Err(e) => warn!(status = %status, error = %e, "Failed to count approvals"),
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to collect approval counts"),
    }
}

static ITEM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{32,64}").unwrap());
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = ITEM_ID.replace_all(path, "{id}");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_item_id() {
        let path = "/api/v1/approvals/3f2a9c4e8b1d7f6a5e4c3b2a1f0e9d8c/decision";
        assert_eq!(normalize_path(path), "/api/v1/approvals/{id}/decision");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/approvals/12345";
        assert_eq!(normalize_path(path), "/api/v1/approvals/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("newsroom_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_dynamic_gauges() {
        APPROVALS_BY_STATUS.with_label_values(&["pending"]).set(0);
        SCHEDULER_RUNNING.set(0);
        ORCHESTRATOR_UP.set(0);
        OFFLOAD_ACTIVE.set(0);
        OFFLOAD_WAITING.set(0);
        CACHED_APPROVALS.set(0);

        let output = encode_metrics();
        assert!(output.contains("newsroom_approvals_by_status"));
        assert!(output.contains("newsroom_scheduler_running"));
        assert!(output.contains("newsroom_orchestrator_up"));
        assert!(output.contains("newsroom_offload_active"));
        assert!(output.contains("newsroom_cached_approvals"));
    }
}
