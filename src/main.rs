use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use mail_merge_service::backends::create_backends;
use mail_merge_service::config::Settings;
use mail_merge_service::dispatch::describe_backends;
use mail_merge_service::postgres::{create_pool, ping};
use mail_merge_service::runs::RunManager;
use mail_merge_service::server::{create_app, AppState};
use mail_merge_service::tasks::RunCleanupTask;
use mail_merge_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (guard flushes spans on exit)
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!("Configuration loaded");

    // PostgreSQL is only needed for the drafts backend
    let postgres_pool = if settings.postgres_drafts.enabled {
        match create_pool(&settings.database).await {
            Ok(pool) => {
                if let Err(e) = ping(&pool).await {
                    tracing::warn!(error = %e, "PostgreSQL ping failed");
                }
                Some(pool)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create PostgreSQL pool, drafts backend disabled");
                None
            }
        }
    } else {
        None
    };

    // Build delivery backends in priority order
    let backends = create_backends(&settings, postgres_pool.clone());
    for backend in describe_backends(&backends) {
        tracing::info!(
            backend = %backend.name,
            kind = ?backend.kind,
            available = backend.available,
            "Delivery backend registered"
        );
    }
    if backends.is_empty() {
        tracing::warn!("No delivery backends configured, runs will be refused");
    }

    // Create application state
    let state = AppState::new(settings.clone(), backends, postgres_pool);
    let runs: Arc<RunManager> = Arc::clone(&state.runs);
    tracing::info!("Application state initialized");

    // Start run cleanup task in background
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let cleanup_task = RunCleanupTask::new(&settings.dispatch, runs.clone(), shutdown_tx.subscribe());
    let cleanup_handle = tokio::spawn(async move {
        cleanup_task.run().await;
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx, runs))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = cleanup_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>, runs: Arc<RunManager>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // In-flight runs stop before their next recipient, which closes their event streams
    let aborted = runs.abort_all();
    if aborted > 0 {
        tracing::info!(aborted = aborted, "Aborted in-flight runs");
    }

    let _ = shutdown_tx.send(());
}
