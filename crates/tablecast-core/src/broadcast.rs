//! Fan-out of domain events to a restaurant's subscribers.
//!
//! [`Broadcaster::emit`] snapshots the channel's recipients from the
//! [`SubscriptionRegistry`] and pushes one shared [`Arc<DomainEvent>`] onto
//! each recipient's outbound queue. Pushes never wait: a session whose
//! queue is closed or full is skipped, logged, and counted as a
//! [`DeliveryFailed`], and delivery continues with the next recipient.
//!
//! Each session's queue is FIFO, so two events emitted one after the other
//! to the same channel arrive at every subscriber in that order.

use std::sync::Arc;

use tablecast_types::{DomainEvent, SessionId};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::registry::SubscriptionRegistry;

/// Why a push to one session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    /// The session's connection task has gone away.
    #[error("connection closed")]
    Closed,
    /// The session's queue is full; the viewer is not keeping up.
    #[error("outbound queue full")]
    Lagging,
}

/// A push to a single subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("delivery to session {session_id} failed: {reason}")]
pub struct DeliveryFailed {
    /// The session that missed the event.
    pub session_id: SessionId,
    /// What went wrong.
    pub reason: DeliveryFailure,
}

/// Outcome of one [`Broadcaster::emit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Subscribers a push was attempted for.
    pub attempted: usize,
    /// Pushes that landed in a queue.
    pub delivered: usize,
    /// Pushes that did not.
    pub failed: Vec<DeliveryFailed>,
}

/// Delivers events to the sessions subscribed to a restaurant channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriptionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub const fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this broadcaster reads from.
    pub const fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Push `event` to every session subscribed to the event's restaurant.
    ///
    /// Never fails as a whole: per-session failures are logged and returned
    /// in the report. An empty channel costs one registry lookup.
    pub async fn emit(&self, event: DomainEvent) -> EmitReport {
        let restaurant_id = event.restaurant_id();
        let kind = event.kind();
        let recipients = self.registry.recipients_of(restaurant_id).await;
        if recipients.is_empty() {
            debug!(%restaurant_id, event = %kind, "No subscribers, skipping emit");
            return EmitReport::default();
        }

        let event = Arc::new(event);
        let mut report = EmitReport {
            attempted: recipients.len(),
            ..EmitReport::default()
        };

        for recipient in recipients {
            match recipient.outbox.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(err) => {
                    let reason = match err {
                        TrySendError::Closed(_) => DeliveryFailure::Closed,
                        TrySendError::Full(_) => DeliveryFailure::Lagging,
                    };
                    let failure = DeliveryFailed {
                        session_id: recipient.session_id,
                        reason,
                    };
                    warn!(%restaurant_id, event = %kind, error = %failure, "Delivery failed");
                    report.failed.push(failure);
                }
            }
        }

        debug!(
            %restaurant_id,
            event = %kind,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Event emitted"
        );
        report
    }
}
