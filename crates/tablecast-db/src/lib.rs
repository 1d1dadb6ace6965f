//! `PostgreSQL` collaborator store for Tablecast.
//!
//! The CRUD service owns restaurants, menus, orders, and deliveries in a
//! shared `PostgreSQL` database. This crate connects to it, applies the
//! schema migrations, and answers the analytics core's reads through
//! [`PgAnalyticsStore`].
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool
//! - [`analytics_store`] -- [`AnalyticsStore`](tablecast_core::AnalyticsStore)
//!   implementation
//! - [`error`] -- Shared error types

pub mod analytics_store;
pub mod error;
pub mod postgres;

// Re-export primary types for convenience.
pub use analytics_store::PgAnalyticsStore;
pub use error::DbError;
pub use postgres::PostgresPool;
