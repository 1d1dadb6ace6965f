//! Viewer and analytics gateway for Tablecast.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) where viewers join and leave
//!   restaurant channels and receive that restaurant's events
//! - **Analytics REST endpoints** for popular dishes, delivery times, peak
//!   hours, stale orders, and full snapshots
//! - **Mutation intake** (`POST /api/events`) through which the CRUD
//!   service reports committed changes
//! - **Status** (`GET /`) with live session and channel counts
//!
//! # Architecture
//!
//! Every socket owns a [`ConnectionSession`] registered with the shared
//! [`SubscriptionRegistry`]. Posted mutations go to the
//! [`RefreshPipeline`], which pushes the raw event to the restaurant's
//! sessions and then refreshes its analytics on a background task.
//!
//! [`ConnectionSession`]: tablecast_core::ConnectionSession
//! [`SubscriptionRegistry`]: tablecast_core::SubscriptionRegistry
//! [`RefreshPipeline`]: tablecast_core::RefreshPipeline

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::GatewayError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
