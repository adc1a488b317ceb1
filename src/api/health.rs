//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backends: BackendHealthResponse,
    pub runs: RunHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct BackendHealthResponse {
    pub configured: usize,
    pub available: usize,
}

#[derive(Debug, Serialize)]
pub struct RunHealthResponse {
    pub active: usize,
    pub tracked: usize,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

/// GET /health - "degraded" when no backend can take a run
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backends = state.runs.backends();
    let available = backends.iter().filter(|b| b.is_available()).count();

    let postgres = state.postgres_pool.as_ref().map(|pool| PostgresHealthResponse {
        connected: !pool.is_closed(),
        pool_size: pool.size(),
        idle_connections: pool.num_idle() as u32,
    });

    let status = if available > 0 { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backends: BackendHealthResponse {
            configured: backends.len(),
            available,
        },
        runs: RunHealthResponse {
            active: state.runs.active_count(),
            tracked: state.runs.run_count(),
        },
        postgres,
    })
}
