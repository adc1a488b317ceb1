//! Backend listing endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::{describe_backends, BackendDescriptor};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct BackendListResponse {
    pub backends: Vec<BackendDescriptor>,
    /// Backend a new run would start on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
}

/// GET /api/v1/backends - Backends in priority order
pub async fn list_backends(State(state): State<AppState>) -> Json<BackendListResponse> {
    let backends = describe_backends(state.runs.backends());
    let preferred = backends
        .iter()
        .find(|backend| backend.available)
        .map(|backend| backend.name.clone());

    Json(BackendListResponse { backends, preferred })
}
