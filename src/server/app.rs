use axum::{middleware, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{api_routes, public_routes};

use super::middleware::api_key_auth;
use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = api_routes().route_layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        // Health & metrics stay outside the API key check
        .merge(public_routes())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
