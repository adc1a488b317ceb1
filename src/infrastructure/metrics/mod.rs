//! Prometheus metrics for the mail merge service.
//!
//! This module provides metrics for monitoring dispatch runs:
//! - Run metrics (started, finished by status, currently active)
//! - Delivery metrics (attempts by backend and result, skipped recipients)
//! - Backend metrics (availability, demotions)
//! - Latency metrics (per-backend delivery latency)

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, RunMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mailmerge";

lazy_static! {
    // ============================================================================
    // Run Metrics
    // ============================================================================

    /// Total dispatch runs started
    pub static ref RUNS_STARTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_runs_started_total", METRIC_PREFIX),
        "Total dispatch runs started"
    ).unwrap();

    /// Total dispatch runs finished by final status
    pub static ref RUNS_FINISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_runs_finished_total", METRIC_PREFIX),
        "Total dispatch runs finished",
        &["status"]
    ).unwrap();

    /// Dispatch runs currently in flight
    pub static ref RUNS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_runs_active", METRIC_PREFIX),
        "Number of dispatch runs currently in flight"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Delivery attempts by backend and result
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total delivery attempts",
        &["backend", "result"]
    ).unwrap();

    /// Recipients skipped because no destination address rendered
    pub static ref RECIPIENTS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_recipients_skipped_total", METRIC_PREFIX),
        "Total recipients skipped for lack of a destination address"
    ).unwrap();

    /// Backend demotions during runs
    pub static ref BACKEND_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_backend_fallbacks_total", METRIC_PREFIX),
        "Total backend fallbacks",
        &["from", "to"]
    ).unwrap();

    /// Backend availability as last observed (1 = available)
    pub static ref BACKEND_AVAILABLE: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_backend_available", METRIC_PREFIX),
        "Whether a delivery backend currently reports itself available",
        &["backend"]
    ).unwrap();

    /// Delivery latency per backend
    pub static ref DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Delivery attempt latency in seconds",
        &["backend"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
