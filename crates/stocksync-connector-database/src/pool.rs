//! Connection pool creation.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use stocksync_core::{StoreError, StoreResult};
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;

/// Validate `config` and open a connection pool.
#[instrument(skip(config), fields(target = %config.display_target()))]
pub async fn connect(config: &DatabaseConfig) -> StoreResult<PgPool> {
    config.validate()?;

    debug!(
        url = %config.redacted().url,
        pool_size = config.pool_size,
        acquire_timeout_secs = config.acquire_timeout_secs,
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            StoreError::connection_failed_with_source(
                format!("Failed to connect to database at {}", config.display_target()),
                e,
            )
        })?;

    info!(pool_size = config.pool_size, "Database connection pool established");

    Ok(pool)
}
