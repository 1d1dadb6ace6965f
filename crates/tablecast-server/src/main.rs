//! Tablecast server binary.
//!
//! Wires the collaborator store, subscription registry, broadcaster,
//! analytics aggregator, and refresh pipeline behind the viewer gateway,
//! then serves until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tablecast-config.yaml` (or `TABLECAST_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the collaborator store (`PostgreSQL` or in-memory)
//! 4. Assemble the refresh pipeline and gateway state
//! 5. Serve HTTP and `WebSocket` traffic until Ctrl-C
//! 6. Close the database pool

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tablecast_core::config::LoggingConfig;
use tablecast_core::{MemoryStore, StoreBackend, TablecastConfig};
use tablecast_db::{PgAnalyticsStore, PostgresPool};
use tablecast_gateway::state::AppState;
use tablecast_gateway::{ServerConfig, start_server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Config file read when `TABLECAST_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "tablecast-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the gateway
/// stops with a fatal I/O error.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Load configuration.
    let config_path = config_path(std::env::var("TABLECAST_CONFIG").ok());
    let config = TablecastConfig::load_or_default(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging)?;
    info!(
        path = %config_path.display(),
        store = ?config.infrastructure.store,
        port = config.server.port,
        "Configuration loaded"
    );

    // 3. Open the collaborator store.
    let backend = open_store(&config).await?;

    // 4. Assemble pipeline and gateway state.
    let state = Arc::new(backend.app_state(&config));
    info!(
        session_buffer = state.session_buffer,
        stale_threshold_minutes = config.analytics.stale_threshold_minutes,
        "Refresh pipeline ready"
    );

    // 5. Serve until interrupted.
    let served = start_server(&ServerConfig::from(&config.server), state, shutdown_signal()).await;

    // 6. Close the pool whether or not serving succeeded.
    if let Backend::Postgres(pool) = &backend {
        pool.close().await;
        info!("PostgreSQL pool closed");
    }
    served?;

    info!("tablecast-server stopped");
    Ok(())
}

/// Resolve the config file path, preferring an explicit override.
fn config_path(override_path: Option<String>) -> PathBuf {
    override_path
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ServerError::Logging {
            message: format!("invalid log filter '{}': {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ServerError::Logging {
        message: format!("{e}"),
    })
}

/// The opened collaborator store.
enum Backend {
    /// Shared pool, closed on shutdown.
    Postgres(PostgresPool),
    /// In-process tables fed by posted events.
    Memory(Arc<MemoryStore>),
}

impl Backend {
    fn app_state(&self, config: &TablecastConfig) -> AppState {
        match self {
            Self::Postgres(pool) => {
                AppState::from_config(Arc::new(PgAnalyticsStore::from_pool(pool)), config)
            }
            Self::Memory(store) => AppState::in_memory(Arc::clone(store), config),
        }
    }
}

/// Open the configured store, applying migrations for `PostgreSQL`.
async fn open_store(config: &TablecastConfig) -> Result<Backend, ServerError> {
    match config.infrastructure.store {
        StoreBackend::Postgres => {
            let pool = PostgresPool::connect(&config.infrastructure).await?;
            pool.run_migrations().await?;
            Ok(Backend::Postgres(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory collaborator store");
            Ok(Backend::Memory(Arc::new(MemoryStore::new())))
        }
    }
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_defaults_when_unset_or_blank() {
        assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            config_path(Some(String::from("  "))),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn config_path_honours_override() {
        assert_eq!(
            config_path(Some(String::from("/etc/tablecast.yaml"))),
            PathBuf::from("/etc/tablecast.yaml")
        );
    }

    #[tokio::test]
    async fn memory_backend_needs_no_pool() {
        let mut config = TablecastConfig::default();
        config.infrastructure.store = StoreBackend::Memory;
        assert!(matches!(open_store(&config).await, Ok(Backend::Memory(_))));
    }

    #[tokio::test]
    async fn memory_backend_mirrors_posted_events() {
        let backend = Backend::Memory(Arc::new(MemoryStore::new()));
        assert!(backend.app_state(&TablecastConfig::default()).mirror.is_some());
    }
}
