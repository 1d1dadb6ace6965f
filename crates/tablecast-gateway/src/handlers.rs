//! REST API endpoint handlers for the gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | JSON status: sessions, channels |
//! | `GET` | `/api/analytics/restaurants/{id}/top-dishes` | Popular dishes |
//! | `GET` | `/api/analytics/restaurants/{id}/delivery-times` | Average delivery time (`?timeWindow=`) |
//! | `GET` | `/api/analytics/restaurants/{id}/peak-times` | Busiest hours |
//! | `GET` | `/api/analytics/restaurants/{id}/snapshot` | Full analytics snapshot |
//! | `GET` | `/api/analytics/orders/stale` | Stale orders, all restaurants (`?minutes=`) |
//! | `POST` | `/api/events` | Committed mutation from the CRUD service |
//! | `POST` | `/api/restaurants/{id}/refresh` | Recompute and broadcast analytics |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use tablecast_types::{DomainEvent, RestaurantId, TimeWindow};
use tracing::info;

use crate::error::GatewayError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the delivery-times endpoint.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTimesQuery {
    /// `day`, `week`, or `month`. Defaults to the configured window.
    pub time_window: Option<String>,
}

/// Query parameters for the stale-orders endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct StaleOrdersQuery {
    /// Age threshold in minutes. Defaults to the configured threshold.
    pub minutes: Option<u32>,
}

fn restaurant(id: i64) -> Result<RestaurantId, GatewayError> {
    let restaurant_id = RestaurantId::new(id);
    if restaurant_id.is_valid() {
        Ok(restaurant_id)
    } else {
        Err(GatewayError::InvalidRestaurant(id))
    }
}

// ---------------------------------------------------------------------------
// GET / -- status
// ---------------------------------------------------------------------------

/// Report that the gateway is up, with live session and channel counts.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.registry().stats().await;
    Json(serde_json::json!({
        "service": "tablecast",
        "status": "running",
        "sessions": stats.sessions,
        "channels": stats.channels,
        "subscriptions": stats.subscriptions,
    }))
}

// ---------------------------------------------------------------------------
// Analytics reads
// ---------------------------------------------------------------------------

/// Top dishes by units sold on delivered orders in the last 30 days.
pub async fn top_dishes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let dishes = state.aggregator().popular_dishes(restaurant(id)?).await?;
    Ok(Json(dishes))
}

/// Average minutes from placement to delivery.
pub async fn delivery_times(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<DeliveryTimesQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let restaurant_id = restaurant(id)?;
    let window = match query.time_window.as_deref() {
        None => state.aggregator().settings().delivery_window,
        Some(raw) => TimeWindow::parse(raw).ok_or_else(|| {
            GatewayError::InvalidQuery(format!(
                "timeWindow must be day, week, or month, got '{raw}'"
            ))
        })?,
    };
    let stats = state
        .aggregator()
        .average_delivery_time(restaurant_id, window)
        .await?;
    Ok(Json(stats))
}

/// Busiest ordering hours over the last 30 days.
pub async fn peak_times(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let peaks = state
        .aggregator()
        .peak_ordering_times(restaurant(id)?)
        .await?;
    Ok(Json(peaks))
}

/// In-flight orders of every restaurant older than the threshold.
pub async fn stale_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StaleOrdersQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let minutes = query
        .minutes
        .unwrap_or(state.aggregator().settings().stale_threshold_minutes);
    let orders = state.aggregator().stale_orders(minutes).await?;
    Ok(Json(orders))
}

/// The full analytics snapshot, computed on demand without broadcasting.
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state.pipeline.snapshot(restaurant(id)?).await;
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// Mutation intake
// ---------------------------------------------------------------------------

/// Accept a committed mutation, record it in the in-process store when
/// there is one, push it to the restaurant's viewers, and schedule an
/// analytics refresh. Responds before the refresh finishes.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DomainEvent>,
) -> Result<impl IntoResponse, GatewayError> {
    if !event.is_consistent() {
        return Err(GatewayError::InvalidEvent(format!(
            "restaurantId {} does not match the {} payload",
            event.restaurant_id(),
            event.kind()
        )));
    }
    if let Some(mirror) = &state.mirror {
        mirror.apply(&event).await;
    }
    let kind = event.kind();
    let restaurant_id = event.restaurant_id();
    let outcome = state.pipeline.on_mutation(event).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "accepted": true,
            "event": kind,
            "restaurantId": restaurant_id,
            "delivered": outcome.report.delivered,
            "refreshScheduled": outcome.refresh.is_some(),
        })),
    ))
}

/// Recompute and broadcast a restaurant's analytics in the background.
#[allow(clippy::unused_async)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let restaurant_id = restaurant(id)?;
    drop(state.pipeline.spawn_refresh(restaurant_id));
    info!(%restaurant_id, "Manual analytics refresh scheduled");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "accepted": true,
            "restaurantId": restaurant_id,
        })),
    ))
}

/// Fallback for paths no route matches.
#[allow(clippy::unused_async)]
pub async fn not_found(uri: Uri) -> GatewayError {
    GatewayError::NotFound(uri.path().to_owned())
}
