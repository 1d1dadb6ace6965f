//! `WebSocket` handler for viewer sessions.
//!
//! Clients connect to `GET /ws`, then send subscription control frames:
//!
//! ```json
//! {"type":"joinRestaurant","restaurantId":5}
//! {"type":"leaveRestaurant","restaurantId":5}
//! ```
//!
//! Each control frame is answered with an acknowledgement:
//!
//! ```json
//! {"type":"ack","action":"joinRestaurant","status":"success","message":"Joined restaurant 5"}
//! ```
//!
//! Events for every joined restaurant are pushed as
//! `{"event":"<name>","restaurantId":N,"data":{...}}`. When the socket
//! closes the session leaves every channel it joined.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tablecast_core::{AckStatus, ConnectionSession, SubscriptionAck};
use tablecast_types::RestaurantId;
use tracing::{debug, warn};

use crate::state::AppState;

/// Subscription control actions a viewer can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlAction {
    /// Start receiving a restaurant's events.
    JoinRestaurant,
    /// Stop receiving a restaurant's events.
    LeaveRestaurant,
}

/// A control frame received from a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    /// What to do.
    #[serde(rename = "type")]
    pub action: ControlAction,
    /// Which restaurant.
    pub restaurant_id: RestaurantId,
}

/// A frame sent to a viewer in reply to a control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Acknowledgement of a control frame.
    Ack {
        /// The action being acknowledged, absent if the frame was unreadable.
        action: Option<ControlAction>,
        /// Outcome.
        status: AckStatus,
        /// Human-readable detail.
        message: String,
    },
}

impl ServerFrame {
    fn ack(action: Option<ControlAction>, ack: SubscriptionAck) -> Self {
        Self::Ack {
            action,
            status: ack.status,
            message: ack.message,
        }
    }
}

/// Upgrade an HTTP request to a `WebSocket` viewer session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_viewer(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Apply one text frame from a viewer to its session and build the reply.
pub async fn handle_frame(session: &ConnectionSession, raw: &str) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(session_id = %session.id(), error = %e, "Unreadable control frame");
            return ServerFrame::ack(None, SubscriptionAck::error(format!("Invalid message: {e}")));
        }
    };

    let ack = match frame.action {
        ControlAction::JoinRestaurant => session.join(frame.restaurant_id).await,
        ControlAction::LeaveRestaurant => session.leave(frame.restaurant_id).await,
    };
    ServerFrame::ack(Some(frame.action), ack)
}

/// Send a serializable value as a text frame. Returns `false` once the
/// client is gone.
async fn send_json<T: Serialize + Sync>(socket: &mut WebSocket, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize outbound frame: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Drive one viewer connection: forward pushed events, answer control
/// frames, and tear the session down when either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session =
        ConnectionSession::open(Arc::clone(state.registry()), state.session_buffer).await;
    let session_id = session.id();
    debug!(%session_id, "WebSocket client connected");

    loop {
        tokio::select! {
            // An event pushed to one of the session's restaurants.
            event = session.recv() => {
                let Some(event) = event else {
                    debug!(%session_id, "Session queue closed");
                    break;
                };
                if !send_json(&mut socket, &*event).await {
                    debug!(%session_id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // A control frame, ping, or close from the client.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_frame(&session, text.as_str()).await;
                        if !send_json(&mut socket, &reply).await {
                            debug!(%session_id, "WebSocket client disconnected (ack failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%session_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%session_id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%session_id, "WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    session.close().await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tablecast_core::SubscriptionRegistry;

    use super::*;

    async fn session() -> (Arc<SubscriptionRegistry>, ConnectionSession) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let session = ConnectionSession::open(Arc::clone(&registry), 8).await;
        (registry, session)
    }

    #[tokio::test]
    async fn join_frame_subscribes_and_acks() {
        let (registry, session) = session().await;
        let reply = handle_frame(&session, r#"{"type":"joinRestaurant","restaurantId":5}"#).await;

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "ack");
        assert_eq!(json["action"], "joinRestaurant");
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Joined restaurant 5");
        assert!(registry.subscribers_of(RestaurantId::new(5)).await.contains(&session.id()));
    }

    #[tokio::test]
    async fn leave_frame_unsubscribes() {
        let (registry, session) = session().await;
        handle_frame(&session, r#"{"type":"joinRestaurant","restaurantId":5}"#).await;
        let reply = handle_frame(&session, r#"{"type":"leaveRestaurant","restaurantId":5}"#).await;

        assert_eq!(
            reply,
            ServerFrame::Ack {
                action: Some(ControlAction::LeaveRestaurant),
                status: AckStatus::Success,
                message: String::from("Left restaurant 5"),
            }
        );
        assert_eq!(registry.stats().await.channels, 0);
    }

    #[tokio::test]
    async fn invalid_id_gets_error_ack() {
        let (_registry, session) = session().await;
        let reply = handle_frame(&session, r#"{"type":"joinRestaurant","restaurantId":0}"#).await;
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["action"], "joinRestaurant");
    }

    #[tokio::test]
    async fn malformed_frame_gets_error_ack() {
        let (_registry, session) = session().await;
        for raw in ["not json", r#"{"type":"dance","restaurantId":1}"#, r#"{"type":"joinRestaurant"}"#] {
            let reply = handle_frame(&session, raw).await;
            let json = serde_json::to_value(&reply).unwrap();
            assert_eq!(json["status"], "error");
            assert!(json["action"].is_null());
        }
    }
}
