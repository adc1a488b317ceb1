//! Prometheus metrics endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    update_metrics_from_state(&state);

    let output = metrics::encode_metrics()
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}

/// Refresh gauges that are sampled rather than recorded
fn update_metrics_from_state(state: &AppState) {
    for backend in state.runs.backends() {
        metrics::BACKEND_AVAILABLE
            .with_label_values(&[backend.name()])
            .set(if backend.is_available() { 1 } else { 0 });
    }
}
