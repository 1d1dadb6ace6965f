//! Axum router construction for the gateway.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the gateway.
///
/// The router includes:
/// - `GET /` -- JSON status
/// - `GET /ws` -- viewer `WebSocket`
/// - `GET /api/analytics/restaurants/{id}/top-dishes`
/// - `GET /api/analytics/restaurants/{id}/delivery-times`
/// - `GET /api/analytics/restaurants/{id}/peak-times`
/// - `GET /api/analytics/restaurants/{id}/snapshot`
/// - `GET /api/analytics/orders/stale`
/// - `POST /api/events` -- mutation intake
/// - `POST /api/restaurants/{id}/refresh` -- manual refresh
///
/// Unmatched paths get a JSON `404`.
/// CORS allows any origin so the dashboard can be served from elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws", get(ws::ws_viewer))
        // Analytics reads
        .route(
            "/api/analytics/restaurants/{id}/top-dishes",
            get(handlers::top_dishes),
        )
        .route(
            "/api/analytics/restaurants/{id}/delivery-times",
            get(handlers::delivery_times),
        )
        .route(
            "/api/analytics/restaurants/{id}/peak-times",
            get(handlers::peak_times),
        )
        .route(
            "/api/analytics/restaurants/{id}/snapshot",
            get(handlers::snapshot),
        )
        .route("/api/analytics/orders/stale", get(handlers::stale_orders))
        // Mutation intake
        .route("/api/events", post(handlers::post_event))
        .route("/api/restaurants/{id}/refresh", post(handlers::refresh))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
