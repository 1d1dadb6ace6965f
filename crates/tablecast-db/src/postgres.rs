//! Pooled connections to the collaborator database.
//!
//! The pool is built straight from the `infrastructure` config section.
//! Queries are assembled at runtime with bound parameters, so no database
//! is needed at build time.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tablecast_core::config::InfrastructureConfig;
use tracing::info;

use crate::error::DbError;

/// How long a query waits for a free connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the shared `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Open a pool against `infrastructure.postgres_url`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL does not parse, or
    /// [`DbError::Postgres`] if no connection can be established.
    pub async fn connect(config: &InfrastructureConfig) -> Result<Self, DbError> {
        let pool = pool_options(config)
            .connect_with(parse_url(&config.postgres_url)?)
            .await?;
        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply the schema under `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// The underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn pool_options(config: &InfrastructureConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

fn parse_url(url: &str) -> Result<PgConnectOptions, DbError> {
    url.parse()
        .map_err(|e: sqlx::Error| DbError::Config(format!("invalid postgres_url: {e}")))
}
