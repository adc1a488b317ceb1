//! API layer - HTTP endpoint handlers organized by domain.

mod backends;
mod health;
mod merge;
mod metrics;
mod routes;
mod runs;

// Re-export all handlers for use in server/app.rs
pub use backends::{list_backends, BackendListResponse};
pub use health::{health, HealthResponse};
pub use merge::{export, preview, variables, PreviewResponse, VariablesResponse};
pub use metrics::prometheus_metrics;
pub use routes::{api_routes, public_routes};
pub use runs::{abort_run, get_run, run_events, start_run, ReportView, RunStatusResponse};
