//! Prometheus metrics for the status surface.
//!
//! The registry holds the HTTP request metrics defined here, the last-cycle
//! gauges refreshed on every scrape, and every metric exported by
//! `sweeparr_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

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
            "sweeparr_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sweeparr_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sweeparr_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Last Cycle (collected dynamically)
// =============================================================================

pub static LAST_CYCLE_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sweeparr_last_cycle_timestamp_seconds",
        "Unix time the most recent cycle finished",
    )
    .unwrap()
});

pub static LAST_CYCLE_JOBS_FAILED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sweeparr_last_cycle_jobs_failed",
        "Jobs that failed in the most recent cycle",
    )
    .unwrap()
});

pub static LAST_CYCLE_REMOVED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sweeparr_last_cycle_removed",
        "Items removed or searched in the most recent cycle",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let local: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(LAST_CYCLE_TIMESTAMP.clone()),
        Box::new(LAST_CYCLE_JOBS_FAILED.clone()),
        Box::new(LAST_CYCLE_REMOVED.clone()),
    ];

    for metric in local
        .into_iter()
        .chain(sweeparr_core::metrics::all_metrics())
    {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh gauges that mirror application state. Called before encoding.
pub async fn collect_dynamic_metrics(state: &AppState) {
    sweeparr_core::metrics::STRIKES_TRACKED.set(state.ledger().count().await as i64);

    if let Some(stats) = state.last_stats().await {
        LAST_CYCLE_TIMESTAMP.set(stats.finished_at.timestamp());
        LAST_CYCLE_JOBS_FAILED.set(stats.jobs_failed as i64);
        LAST_CYCLE_REMOVED.set(stats.total_removed() as i64);
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static HASH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = HASH_SEGMENT.replace_all(&result, "{hash}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
