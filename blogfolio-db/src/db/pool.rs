//! Database connection pool management
//!
//! The pool is created once by the caller and handed to the executor and
//! repositories by reference; nothing in this crate holds a global pool.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DbConfig;

/// Default maximum connections for the pool.
/// Page reads hold a connection for one statement, so a small pool suffices.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a page request waits for a free connection before failing
/// with a retryable pool timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection fails.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/blogfolio").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Create a PostgreSQL connection pool with custom options.
///
/// # Arguments
///
/// * `database_url` - PostgreSQL connection string
/// * `max_connections` - Maximum number of connections in the pool
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Create a pool from loaded configuration.
///
/// Returns `Ok(None)` when no database URL is configured.
pub async fn create_pool_from_config(config: &DbConfig) -> Result<Option<PgPool>, sqlx::Error> {
    match config.database_url.as_deref() {
        Some(url) => create_pool_with_options(url, config.max_connections)
            .await
            .map(Some),
        None => Ok(None),
    }
}
