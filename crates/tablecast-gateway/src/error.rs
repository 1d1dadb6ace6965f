//! Error types for the gateway.
//!
//! [`GatewayError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tablecast_core::{AggregationFailed, RefreshError};

/// Errors that can occur in the gateway's HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No route matched the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// A restaurant id in the path was below 1.
    #[error("invalid restaurant id: {0}")]
    InvalidRestaurant(i64),

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A posted event was rejected before broadcast.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// An analytics query failed.
    #[error(transparent)]
    Analytics(#[from] AggregationFailed),

    /// The refresh pipeline rejected the request.
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRestaurant(_)
            | Self::InvalidQuery(_)
            | Self::InvalidEvent(_)
            | Self::Refresh(RefreshError::NotAMutation { .. }) => StatusCode::BAD_REQUEST,
            Self::Analytics(_) | Self::Refresh(RefreshError::AllQueriesFailed { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
