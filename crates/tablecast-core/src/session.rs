//! One live viewer connection.
//!
//! A [`ConnectionSession`] is the transport-independent half of a viewer
//! connection: it owns the receiving end of the session's event queue and
//! knows how to join and leave restaurant channels. The gateway's socket
//! task drives it; tests drive it directly.
//!
//! The session must be ended with [`ConnectionSession::close`], which drops
//! it from the registry. Closing also drops the only sender of its queue,
//! so no further events can be delivered to it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tablecast_types::{DomainEvent, RestaurantId, SessionId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::SubscriptionRegistry;

/// Result status of a subscription control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// The request was applied (or was already in effect).
    Success,
    /// The request was rejected.
    Error,
}

/// Acknowledgement returned for `joinRestaurant` / `leaveRestaurant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionAck {
    /// Outcome.
    pub status: AckStatus,
    /// Human-readable detail.
    pub message: String,
}

impl SubscriptionAck {
    /// A successful acknowledgement.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: message.into(),
        }
    }

    /// A rejection.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: message.into(),
        }
    }

    /// Whether the request was applied.
    pub fn is_success(&self) -> bool {
        self.status == AckStatus::Success
    }
}

/// A viewer connection registered with a [`SubscriptionRegistry`].
#[derive(Debug)]
pub struct ConnectionSession {
    id: SessionId,
    registry: Arc<SubscriptionRegistry>,
    inbox: mpsc::Receiver<Arc<DomainEvent>>,
}

impl ConnectionSession {
    /// Attach a new session to `registry` with room for `buffer` pending
    /// events.
    pub async fn open(registry: Arc<SubscriptionRegistry>, buffer: usize) -> Self {
        let id = SessionId::new();
        let (outbox, inbox) = mpsc::channel(buffer.max(1));
        registry.attach(id, outbox).await;
        debug!(session_id = %id, "Session opened");
        Self {
            id,
            registry,
            inbox,
        }
    }

    /// This session's id.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Start receiving events for `restaurant_id`.
    pub async fn join(&self, restaurant_id: RestaurantId) -> SubscriptionAck {
        if !restaurant_id.is_valid() {
            return SubscriptionAck::error(format!("Invalid restaurant id {restaurant_id}"));
        }
        match self.registry.subscribe(self.id, restaurant_id).await {
            Ok(_) => SubscriptionAck::success(format!("Joined restaurant {restaurant_id}")),
            Err(e) => SubscriptionAck::error(e.to_string()),
        }
    }

    /// Stop receiving events for `restaurant_id`.
    pub async fn leave(&self, restaurant_id: RestaurantId) -> SubscriptionAck {
        if !restaurant_id.is_valid() {
            return SubscriptionAck::error(format!("Invalid restaurant id {restaurant_id}"));
        }
        self.registry.unsubscribe(self.id, restaurant_id).await;
        SubscriptionAck::success(format!("Left restaurant {restaurant_id}"))
    }

    /// Restaurants this session currently watches.
    pub async fn channels(&self) -> BTreeSet<RestaurantId> {
        self.registry.channels_of(self.id).await
    }

    /// Wait for the next pushed event.
    ///
    /// Returns `None` once the session has been dropped from the registry
    /// and its queue is drained. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Arc<DomainEvent>> {
        self.inbox.recv().await
    }

    /// Take the next pushed event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<DomainEvent>> {
        self.inbox.try_recv().ok()
    }

    /// Tear the session down, removing it from every channel it joined.
    pub async fn close(self) -> BTreeSet<RestaurantId> {
        let left = self.registry.drop_session(self.id).await;
        debug!(session_id = %self.id, channels = left.len(), "Session closed");
        left
    }
}

#[cfg(test)]
mod tests {
    use tablecast_types::MenuItemId;

    use super::*;
    use crate::broadcast::Broadcaster;

    #[tokio::test]
    async fn join_and_leave_acknowledge() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let session = ConnectionSession::open(Arc::clone(&registry), 4).await;

        let ack = session.join(RestaurantId::new(5)).await;
        assert!(ack.is_success());
        assert_eq!(ack.message, "Joined restaurant 5");
        assert_eq!(session.channels().await.len(), 1);

        let ack = session.leave(RestaurantId::new(5)).await;
        assert_eq!(ack, SubscriptionAck::success("Left restaurant 5"));
        assert!(session.channels().await.is_empty());
    }

    #[tokio::test]
    async fn rejects_invalid_restaurant() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let session = ConnectionSession::open(Arc::clone(&registry), 4).await;
        let ack = session.join(RestaurantId::new(0)).await;
        assert_eq!(ack.status, AckStatus::Error);
        assert_eq!(registry.stats().await.channels, 0);
    }

    #[tokio::test]
    async fn watches_several_restaurants() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut session = ConnectionSession::open(Arc::clone(&registry), 4).await;
        session.join(RestaurantId::new(1)).await;
        session.join(RestaurantId::new(2)).await;

        broadcaster
            .emit(DomainEvent::menu_item_deleted(RestaurantId::new(1), MenuItemId::new(7)))
            .await;
        broadcaster
            .emit(DomainEvent::menu_item_deleted(RestaurantId::new(2), MenuItemId::new(8)))
            .await;

        let first = session.try_recv().map(|e| e.restaurant_id());
        let second = session.try_recv().map(|e| e.restaurant_id());
        assert_eq!(first, Some(RestaurantId::new(1)));
        assert_eq!(second, Some(RestaurantId::new(2)));
    }

    #[tokio::test]
    async fn close_removes_from_every_channel() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let session = ConnectionSession::open(Arc::clone(&registry), 4).await;
        let id = session.id();
        session.join(RestaurantId::new(1)).await;
        session.join(RestaurantId::new(3)).await;

        let left = session.close().await;
        assert_eq!(left.len(), 2);
        assert!(!registry.subscribers_of(RestaurantId::new(1)).await.contains(&id));
        assert!(!registry.subscribers_of(RestaurantId::new(3)).await.contains(&id));
        assert!(registry.is_consistent().await);
    }
}
