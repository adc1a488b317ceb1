//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    BACKEND_FALLBACKS_TOTAL, DELIVERIES_TOTAL, DELIVERY_LATENCY, RECIPIENTS_SKIPPED_TOTAL,
    RUNS_ACTIVE, RUNS_FINISHED_TOTAL, RUNS_STARTED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording run lifecycle metrics
pub struct RunMetrics;

impl RunMetrics {
    /// Record a run that passed its preconditions
    pub fn record_started() {
        RUNS_STARTED_TOTAL.inc();
        RUNS_ACTIVE.inc();
    }

    /// Record a finished run with its final status label
    pub fn record_finished(status: &str) {
        RUNS_FINISHED_TOTAL.with_label_values(&[status]).inc();
        RUNS_ACTIVE.dec();
    }

    /// Record a run rejected before any attempt
    pub fn record_rejected() {
        RUNS_FINISHED_TOTAL.with_label_values(&["not_started"]).inc();
    }
}

/// Helper struct for recording per-recipient delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_delivered(backend: &str, latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&[backend, "delivered"]).inc();
        DELIVERY_LATENCY
            .with_label_values(&[backend])
            .observe(latency.as_secs_f64());
    }

    pub fn record_failed(backend: &str, latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&[backend, "failed"]).inc();
        DELIVERY_LATENCY
            .with_label_values(&[backend])
            .observe(latency.as_secs_f64());
    }

    /// Record a recipient that had no backend left to try
    pub fn record_unroutable() {
        DELIVERIES_TOTAL.with_label_values(&["none", "failed"]).inc();
    }

    pub fn record_skipped() {
        RECIPIENTS_SKIPPED_TOTAL.inc();
    }

    pub fn record_fallback(from: &str, to: &str) {
        BACKEND_FALLBACKS_TOTAL.with_label_values(&[from, to]).inc();
    }
}
