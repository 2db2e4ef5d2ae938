//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Strike ledger throughput
//! - Detection and search jobs (found, actioned, runs)
//! - Cycle duration
//! - External services (*arr instances, download clients)

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Strike Ledger Metrics
// =============================================================================

/// Strikes recorded since startup.
pub static STRIKES_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("sweeparr_strikes_added_total", "Total strikes recorded").unwrap()
});

/// Strike records cleared (removal, recovery or explicit reset).
pub static STRIKES_RESET: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sweeparr_strikes_reset_total",
        "Total strike records cleared by reset",
    )
    .unwrap()
});

/// Items currently carrying at least one strike.
pub static STRIKES_TRACKED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sweeparr_strikes_tracked",
        "Number of items currently tracked in the strike ledger",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Items matching a job's predicate.
pub static ITEMS_FOUND: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sweeparr_items_found_total", "Items flagged by a job"),
        &["job"],
    )
    .unwrap()
});

/// Items a job acted upon.
pub static ITEMS_ACTIONED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sweeparr_items_actioned_total", "Items removed, tagged or skipped"),
        &["job", "action"], // action: "remove", "tag", "skip", "dry_run"
    )
    .unwrap()
});

/// Job runs by result.
pub static JOB_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sweeparr_job_runs_total", "Total job runs"),
        &["job", "result"], // result: "success", "error", "cancelled"
    )
    .unwrap()
});

/// Searches triggered on *arr instances.
pub static SEARCHES_TRIGGERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sweeparr_searches_triggered_total", "Searches triggered"),
        &["job"],
    )
    .unwrap()
});

/// Duration of one full cycle.
pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("sweeparr_cycle_duration_seconds", "Duration of a cycle")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sweeparr_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sweeparr_external_requests_total",
            "Total external service requests",
        ),
        &["service", "result"], // result: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Strikes
        Box::new(STRIKES_ADDED.clone()),
        Box::new(STRIKES_RESET.clone()),
        Box::new(STRIKES_TRACKED.clone()),
        // Jobs
        Box::new(ITEMS_FOUND.clone()),
        Box::new(ITEMS_ACTIONED.clone()),
        Box::new(JOB_RUNS.clone()),
        Box::new(SEARCHES_TRIGGERED.clone()),
        Box::new(CYCLE_DURATION.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
