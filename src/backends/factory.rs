//! Delivery backend factory

use std::sync::Arc;

use sqlx::PgPool;

use crate::dispatch::DeliveryBackend;
use crate::infrastructure::config::Settings;

use super::compose::ComposeBackend;
use super::memory::MemoryBackend;
use super::postgres::PostgresDraftBackend;
use super::remote::RemoteDraftBackend;

/// Build the ordered backend list from configuration.
///
/// Follows `dispatch.backend_order`, most capable first:
/// - `"remote"`: needs `remote.enabled`, an endpoint and a credential
/// - `"postgres"`: needs `postgres_drafts.enabled` and a database pool
/// - `"compose"`: needs `compose.enabled`
/// - `"memory"`: needs `memory.enabled`
///
/// Disabled or unconfigured entries are skipped with a log line. An enabled
/// memory backend that is not named in the order goes last.
pub fn create_backends(settings: &Settings, pool: Option<PgPool>) -> Vec<Arc<dyn DeliveryBackend>> {
    let mut backends: Vec<Arc<dyn DeliveryBackend>> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for name in &settings.dispatch.backend_order {
        let name = name.trim();
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        match name {
            "remote" if settings.remote.enabled => match RemoteDraftBackend::from_config(&settings.remote) {
                Ok(Some(backend)) => {
                    tracing::info!(backend = "remote", "Creating remote draft backend");
                    backends.push(Arc::new(backend));
                }
                Ok(None) => {
                    tracing::warn!("Remote backend enabled but endpoint or credential missing, skipping");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create remote backend");
                }
            },
            "postgres" if settings.postgres_drafts.enabled => match &pool {
                Some(pool) => match PostgresDraftBackend::new(pool.clone(), &settings.postgres_drafts.table) {
                    Ok(backend) => {
                        tracing::info!(
                            backend = "postgres",
                            table = %settings.postgres_drafts.table,
                            "Creating PostgreSQL draft backend"
                        );
                        backends.push(Arc::new(backend));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create PostgreSQL draft backend");
                    }
                },
                None => {
                    tracing::warn!("PostgreSQL drafts enabled but no pool provided, skipping");
                }
            },
            "compose" if settings.compose.enabled => {
                tracing::info!(
                    backend = "compose",
                    outbox_dir = %settings.compose.outbox_dir,
                    "Creating compose backend"
                );
                backends.push(Arc::new(ComposeBackend::new(&settings.compose)));
            }
            "memory" if settings.memory.enabled => {
                tracing::info!(backend = "memory", "Creating memory backend");
                backends.push(Arc::new(MemoryBackend::new()));
            }
            "remote" | "postgres" | "compose" | "memory" => {
                tracing::debug!(backend = %name, "Backend disabled, skipping");
            }
            other => {
                tracing::warn!(backend = %other, "Unknown backend in dispatch order, skipping");
            }
        }
    }

    if settings.memory.enabled && !seen.contains(&"memory") {
        tracing::info!(backend = "memory", "Creating memory backend");
        backends.push(Arc::new(MemoryBackend::new()));
    }

    backends
}
