//! Prometheus metrics for the template renderer.
//!
//! - Render metrics (renders by result, render latency)
//! - Cache metrics (hits, misses, live entries)
//! - Warning metrics (unknown formatters/functions, malformed conditions)

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "template_renderer";

lazy_static! {
    /// Total renders by result (ok, error, cached)
    pub static ref RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_renders_total", METRIC_PREFIX),
        "Total template renders",
        &["result"]
    ).unwrap();

    /// Time spent running the render pipeline
    pub static ref RENDER_DURATION: Histogram = register_histogram!(
        format!("{}_render_duration_seconds", METRIC_PREFIX),
        "Render pipeline duration in seconds",
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]
    ).unwrap();

    /// Render cache hits
    pub static ref CACHE_HITS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_cache_hits_total", METRIC_PREFIX),
        "Total render cache hits"
    ).unwrap();

    /// Render cache misses
    pub static ref CACHE_MISSES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_cache_misses_total", METRIC_PREFIX),
        "Total render cache misses"
    ).unwrap();

    /// Entries currently held by the render cache
    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        format!("{}_cache_entries", METRIC_PREFIX),
        "Entries currently held by the render cache"
    ).unwrap();

    /// Non-fatal template problems by kind
    pub static ref WARNINGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_warnings_total", METRIC_PREFIX),
        "Non-fatal template problems",
        &["kind"]
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording render metrics
pub struct RenderMetrics;

impl RenderMetrics {
    /// Record a completed pipeline run
    pub fn record_rendered(duration_secs: f64) {
        RENDERS_TOTAL.with_label_values(&["ok"]).inc();
        RENDER_DURATION.observe(duration_secs);
    }

    /// Record a render aborted by a `RenderError`
    pub fn record_failed() {
        RENDERS_TOTAL.with_label_values(&["error"]).inc();
    }

    /// Record a render served from the cache
    pub fn record_cache_hit() {
        RENDERS_TOTAL.with_label_values(&["cached"]).inc();
        CACHE_HITS_TOTAL.inc();
    }

    pub fn record_cache_miss() {
        CACHE_MISSES_TOTAL.inc();
    }

    pub fn set_cache_entries(count: usize) {
        CACHE_ENTRIES.set(count as i64);
    }

    /// Record a non-fatal problem (`unknown_formatter`, `unknown_function`,
    /// `malformed_condition`)
    pub fn record_warning(kind: &str) {
        WARNINGS_TOTAL.with_label_values(&[kind]).inc();
    }
}
