//! Prometheus metrics for supermock.
//!
//! Tracks served requests, strategy latency, upstream failures, registry
//! mutations and route rebuilds. Exposed by the admin API at `GET /metrics`.
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::time::Duration;
use tracing::warn;

lazy_static! {
    /// Requests answered on the mock listener
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "supermock_requests_total",
        "Total number of mock requests served",
        &["method", "outcome"]  // outcome: matched|not_found|error
    )
    .unwrap();

    /// Time spent inside a response strategy, delay excluded
    pub static ref STRATEGY_DURATION_MS: HistogramVec = register_histogram_vec!(
        "supermock_strategy_duration_ms",
        "Histogram of strategy execution time in milliseconds",
        &["strategy"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]
    )
    .unwrap();

    /// Per-request failures by kind
    pub static ref DISPATCH_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "supermock_dispatch_errors_total",
        "Total number of requests that ended in a dispatch error",
        &["kind"]
    )
    .unwrap();

    pub static ref UPSTREAM_ERRORS_TOTAL: Counter = register_counter!(
        "supermock_upstream_errors_total",
        "Total number of failed proxy round trips"
    )
    .unwrap();

    pub static ref REGISTRY_MUTATIONS_TOTAL: Counter = register_counter!(
        "supermock_registry_mutations_total",
        "Total number of successful registry mutations"
    )
    .unwrap();

    /// Route tree rebuilds
    pub static ref ROUTE_REBUILDS_MS: HistogramVec = register_histogram_vec!(
        "supermock_route_rebuild_duration_ms",
        "Histogram of route tree rebuild time in milliseconds",
        &["scope"],  // scope: full|space
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub fn record_request(method: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

pub fn record_strategy(strategy: &str, elapsed: Duration) {
    STRATEGY_DURATION_MS
        .with_label_values(&[strategy])
        .observe(millis(elapsed));
}

pub fn record_dispatch_error(kind: &str) {
    DISPATCH_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_upstream_error() {
    UPSTREAM_ERRORS_TOTAL.inc();
}

pub fn record_mutation() {
    REGISTRY_MUTATIONS_TOTAL.inc();
}

pub fn record_rebuild(scope: &str, elapsed: Duration) {
    ROUTE_REBUILDS_MS
        .with_label_values(&[scope])
        .observe(millis(elapsed));
}
