//! PostgreSQL connection pool construction and health checks.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Errors that can occur with the PostgreSQL pool.
#[derive(Debug, Error)]
pub enum PostgresPoolError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database URL is not configured")]
    NotConfigured,
}

/// Create a PostgreSQL pool from configuration and connect eagerly.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, PostgresPoolError> {
    let url = config
        .url
        .as_deref()
        .ok_or(PostgresPoolError::NotConfigured)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .connect(url)
        .await?;

    tracing::info!(
        pool_size = config.pool_size,
        "PostgreSQL connection pool created"
    );

    Ok(pool)
}

/// Round-trip a trivial query to verify the pool can serve requests.
pub async fn ping(pool: &PgPool) -> Result<(), PostgresPoolError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_requires_url() {
        let config = DatabaseConfig::default();
        let result = create_pool(&config).await;
        assert!(matches!(result, Err(PostgresPoolError::NotConfigured)));
    }
}
