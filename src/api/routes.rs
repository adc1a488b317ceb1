use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::backends::list_backends;
use super::health::health;
use super::merge::{export, preview, variables};
use super::metrics::prometheus_metrics;
use super::runs::{abort_run, get_run, run_events, start_run};

/// Unauthenticated operational endpoints
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
}

/// Endpoints nested under `/api/v1`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/backends", get(list_backends))
        // Template tooling
        .route("/merge/preview", post(preview))
        .route("/merge/export", post(export))
        .route("/merge/variables", post(variables))
        // Runs
        .route("/runs", post(start_run))
        .route("/runs/{id}", get(get_run).delete(abort_run))
        .route("/runs/{id}/events", get(run_events))
}
