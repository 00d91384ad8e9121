//! Prometheus metrics for the refresh service
//!
//! This module tracks:
//! - Refresh cycles: outcome, duration, time of the last success
//! - Fetching: per-candidate outcome and time spent throttled
//! - Serving: whether a selection is published, HTTP requests by route
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, every recording helper
//! is a no-op.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram,
    register_histogram_vec, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramVec,
    TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

struct RefreshMetrics {
    cycles: CounterVec,
    cycle_duration: Histogram,
    last_refresh_timestamp: Gauge,
    selection_published: Gauge,
    fetches: CounterVec,
    throttled_seconds: Counter,
    http_requests: CounterVec,
    http_duration: HistogramVec,
}

static REFRESH_METRICS: OnceLock<RefreshMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```no_run
/// if let Err(e) = hindsight::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = RefreshMetrics {
        cycles: register_counter_vec!(
            "hindsight_refresh_cycles_total",
            "Refresh cycles by outcome",
            &["outcome"]
        )?,
        cycle_duration: register_histogram!(
            "hindsight_refresh_cycle_duration_seconds",
            "Wall time of one refresh cycle in seconds",
            vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0]
        )?,
        last_refresh_timestamp: register_gauge!(
            "hindsight_last_refresh_timestamp_seconds",
            "Unix time of the last successful refresh"
        )?,
        selection_published: register_gauge!(
            "hindsight_selection_published",
            "Whether a selection is available to readers (1 = yes, 0 = no)"
        )?,
        fetches: register_counter_vec!(
            "hindsight_fetches_total",
            "Candidate fetches by result",
            &["result"]
        )?,
        throttled_seconds: register_counter!(
            "hindsight_throttled_seconds_total",
            "Total time spent waiting for rate-limit slots"
        )?,
        http_requests: register_counter_vec!(
            "hindsight_http_requests_total",
            "HTTP requests by route and status",
            &["route", "status"]
        )?,
        http_duration: register_histogram_vec!(
            "hindsight_http_request_duration_seconds",
            "HTTP request duration in seconds",
            &["route"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
        )?,
    };

    REFRESH_METRICS
        .set(metrics)
        .map_err(|_| "Refresh metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    REFRESH_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the end of a refresh cycle
pub fn record_cycle(outcome: &str) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.cycles.with_label_values(&[outcome]).inc();
    }
}

pub fn observe_cycle_duration(elapsed: Duration) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.cycle_duration.observe(elapsed.as_secs_f64());
    }
}

/// Record the time of a successful refresh
pub fn set_last_refresh(unix_secs: i64) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.last_refresh_timestamp.set(unix_secs as f64);
    }
}

pub fn set_selection_published(published: bool) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.selection_published.set(if published { 1.0 } else { 0.0 });
    }
}

/// Record one candidate fetch
pub fn record_fetch(success: bool) {
    if let Some(m) = REFRESH_METRICS.get() {
        let result = if success { "success" } else { "failure" };
        m.fetches.with_label_values(&[result]).inc();
    }
}

/// Record time spent blocked on the rate limiter
pub fn record_throttle_wait(waited: Duration) {
    if waited.is_zero() {
        return;
    }
    if let Some(m) = REFRESH_METRICS.get() {
        m.throttled_seconds.inc_by(waited.as_secs_f64());
    }
}

/// Record an HTTP request
pub fn record_http_request(route: &str, status: u16, duration_secs: f64) {
    let Some(m) = REFRESH_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.http_requests
        .with_label_values(&[route, &status_str])
        .inc();
    m.http_duration
        .with_label_values(&[route])
        .observe(duration_secs);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(metrics_initialized());
    }

    #[test]
    fn test_encode_contains_recorded_metrics() {
        ensure_metrics_initialized();
        record_cycle("success");
        record_fetch(true);
        record_fetch(false);

        let text = encode_metrics().unwrap();
        assert!(text.contains("hindsight_refresh_cycles_total"));
        assert!(text.contains("hindsight_fetches_total"));
    }

    #[test]
    fn test_recording_helpers() {
        ensure_metrics_initialized();
        observe_cycle_duration(Duration::from_secs(42));
        set_last_refresh(1_483_412_407);
        set_selection_published(true);
        record_throttle_wait(Duration::from_millis(1500));
        record_throttle_wait(Duration::ZERO);
        record_http_request("/", 200, 0.002);
    }
}
