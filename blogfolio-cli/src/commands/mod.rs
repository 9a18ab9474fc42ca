//! Command implementations for the blogfolio CLI

pub mod list;
pub mod schema;

use anyhow::{anyhow, Context, Result};
use blogfolio_db::db::create_pool_from_config;
use blogfolio_db::AppConfig;
use sqlx::PgPool;

// Re-export main dispatcher functions for flat access from main.rs
pub use list::{run_comments, run_posts, run_users};
pub use schema::run_schema;

/// Resolved configuration shared by every database command
#[derive(Debug, Clone)]
pub struct Runtime {
    pub config: AppConfig,
}

impl Runtime {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Connect using the configured database URL.
    pub async fn pool(&self) -> Result<PgPool> {
        create_pool_from_config(&self.config.database)
            .await
            .context("Failed to connect to PostgreSQL")?
            .ok_or_else(|| {
                anyhow!("No database configured\n\nSet DATABASE_URL or pass --database-url")
            })
    }
}
