// Prometheus metrics definitions for the Bug Arena backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total creatures recruited into the arena.
    pub static ref RECRUITS_TOTAL: IntCounter = IntCounter::new(
        "bug_arena_recruits_total",
        "Creatures recruited",
    )
    .unwrap();

    /// Analyzed images the model refused to call a bug.
    pub static ref ANALYSIS_REJECTIONS_TOTAL: IntCounter = IntCounter::new(
        "bug_arena_analysis_rejections_total",
        "Images rejected as not-a-bug",
    )
    .unwrap();

    /// Battles applied, by outcome source (resolved vs. fallback).
    pub static ref BATTLES_RESOLVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bug_arena_battles_resolved_total", "Battles applied"),
        &["source"],
    )
    .unwrap();

    /// Model gateway errors, by gateway (analysis, battle).
    pub static ref GATEWAY_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bug_arena_gateway_errors_total", "Model gateway errors"),
        &["gateway"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Model call duration in seconds, by gateway.
    pub static ref GATEWAY_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bug_arena_gateway_call_duration_seconds",
            "Model call duration in seconds",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 60.0]),
        &["gateway"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECRUITS_TOTAL.clone()),
        Box::new(ANALYSIS_REJECTIONS_TOTAL.clone()),
        Box::new(BATTLES_RESOLVED_TOTAL.clone()),
        Box::new(GATEWAY_ERRORS_TOTAL.clone()),
        Box::new(GATEWAY_CALL_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("bug_arena_"));
    }

    #[test]
    fn test_metric_increments() {
        RECRUITS_TOTAL.inc();
        ANALYSIS_REJECTIONS_TOTAL.inc();
        BATTLES_RESOLVED_TOTAL.with_label_values(&["resolved"]).inc();
        BATTLES_RESOLVED_TOTAL.with_label_values(&["fallback"]).inc();
        GATEWAY_ERRORS_TOTAL.with_label_values(&["analysis"]).inc();
        GATEWAY_CALL_DURATION_SECONDS
            .with_label_values(&["battle"])
            .observe(1.2);
    }
}
