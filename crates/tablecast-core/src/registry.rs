//! Subscription registry: which viewer sessions watch which restaurants.
//!
//! The registry owns two maps that mirror each other:
//!
//! - channel map: `restaurant -> {session}`
//! - session map: `session -> ({restaurant}, outbox)`
//!
//! Every session listed in a channel lists that channel, and vice versa.
//! Both maps live behind one [`Mutex`], and every public operation takes
//! the lock exactly once, so no caller can observe (or leave behind) a
//! half-applied change. Channels are created on first subscribe and pruned
//! when their last subscriber leaves.
//!
//! A session must be [attached](SubscriptionRegistry::attach) before it can
//! subscribe. Once [dropped](SubscriptionRegistry::drop_session) it is
//! unknown again, so a subscribe racing a disconnect is rejected instead of
//! re-inserting a dead session into a channel.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tablecast_types::{DomainEvent, RestaurantId, SessionId};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Sending half of a session's outbound event queue.
pub type Outbox = mpsc::Sender<Arc<DomainEvent>>;

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The session is not attached (never connected, or already dropped).
    #[error("session {0} is not connected")]
    SessionNotConnected(SessionId),
}

/// A subscriber captured at broadcast time.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// The subscribed session.
    pub session_id: SessionId,
    /// Where to push events for it.
    pub outbox: Outbox,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistryStats {
    /// Attached sessions.
    pub sessions: usize,
    /// Channels with at least one subscriber.
    pub channels: usize,
    /// Session/channel pairs.
    pub subscriptions: usize,
}

#[derive(Debug)]
struct SessionEntry {
    channels: BTreeSet<RestaurantId>,
    outbox: Outbox,
}

#[derive(Debug, Default)]
struct Maps {
    channels: BTreeMap<RestaurantId, BTreeSet<SessionId>>,
    sessions: BTreeMap<SessionId, SessionEntry>,
}

impl Maps {
    fn remove_from_channel(&mut self, restaurant_id: RestaurantId, session_id: SessionId) {
        if let Some(members) = self.channels.get_mut(&restaurant_id) {
            members.remove(&session_id);
            if members.is_empty() {
                self.channels.remove(&restaurant_id);
            }
        }
    }
}

/// Thread-safe map of restaurant channels to viewer sessions.
///
/// Instances are independent; there is no process-wide registry.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    maps: Mutex<Maps>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected session and the queue its events go to.
    ///
    /// Returns `false` (and keeps the existing outbox) if the session is
    /// already attached.
    pub async fn attach(&self, session_id: SessionId, outbox: Outbox) -> bool {
        let mut maps = self.maps.lock().await;
        if maps.sessions.contains_key(&session_id) {
            return false;
        }
        maps.sessions.insert(
            session_id,
            SessionEntry {
                channels: BTreeSet::new(),
                outbox,
            },
        );
        true
    }

    /// Add `session_id` to `restaurant_id`'s channel. Idempotent.
    ///
    /// Returns `Ok(true)` if the subscription is new, `Ok(false)` if it
    /// already existed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SessionNotConnected`] if the session is not
    /// attached.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        restaurant_id: RestaurantId,
    ) -> Result<bool, RegistryError> {
        let mut maps = self.maps.lock().await;
        let entry = maps
            .sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::SessionNotConnected(session_id))?;
        let added = entry.channels.insert(restaurant_id);
        maps.channels
            .entry(restaurant_id)
            .or_default()
            .insert(session_id);
        if added {
            debug!(%session_id, %restaurant_id, "Session joined restaurant channel");
        }
        Ok(added)
    }

    /// Remove `session_id` from `restaurant_id`'s channel. Idempotent.
    ///
    /// Returns `true` if a subscription was removed.
    pub async fn unsubscribe(&self, session_id: SessionId, restaurant_id: RestaurantId) -> bool {
        let mut maps = self.maps.lock().await;
        let removed = maps
            .sessions
            .get_mut(&session_id)
            .is_some_and(|entry| entry.channels.remove(&restaurant_id));
        maps.remove_from_channel(restaurant_id, session_id);
        if removed {
            debug!(%session_id, %restaurant_id, "Session left restaurant channel");
        }
        removed
    }

    /// Forget a session entirely, removing it from every channel it joined.
    ///
    /// Safe to call for a session that never subscribed, or was never
    /// attached. Returns the channels the session was removed from.
    pub async fn drop_session(&self, session_id: SessionId) -> BTreeSet<RestaurantId> {
        let mut maps = self.maps.lock().await;
        let Some(entry) = maps.sessions.remove(&session_id) else {
            return BTreeSet::new();
        };
        for restaurant_id in &entry.channels {
            maps.remove_from_channel(*restaurant_id, session_id);
        }
        debug!(
            %session_id,
            channels = entry.channels.len(),
            "Session dropped from registry"
        );
        entry.channels
    }

    /// Snapshot of the sessions subscribed to `restaurant_id`.
    pub async fn subscribers_of(&self, restaurant_id: RestaurantId) -> BTreeSet<SessionId> {
        self.maps
            .lock()
            .await
            .channels
            .get(&restaurant_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the subscribers of `restaurant_id` together with their
    /// outboxes, taken under a single lock.
    pub async fn recipients_of(&self, restaurant_id: RestaurantId) -> Vec<Recipient> {
        let maps = self.maps.lock().await;
        let Some(members) = maps.channels.get(&restaurant_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|session_id| {
                maps.sessions.get(session_id).map(|entry| Recipient {
                    session_id: *session_id,
                    outbox: entry.outbox.clone(),
                })
            })
            .collect()
    }

    /// Snapshot of the channels `session_id` subscribes to.
    pub async fn channels_of(&self, session_id: SessionId) -> BTreeSet<RestaurantId> {
        self.maps
            .lock()
            .await
            .sessions
            .get(&session_id)
            .map(|entry| entry.channels.clone())
            .unwrap_or_default()
    }

    /// Current counters.
    pub async fn stats(&self) -> RegistryStats {
        let maps = self.maps.lock().await;
        RegistryStats {
            sessions: maps.sessions.len(),
            channels: maps.channels.len(),
            subscriptions: maps.channels.values().map(BTreeSet::len).sum(),
        }
    }

    /// Check that the channel map and the session map mirror each other and
    /// that no channel is empty.
    pub async fn is_consistent(&self) -> bool {
        let maps = self.maps.lock().await;
        let channels_ok = maps.channels.iter().all(|(restaurant_id, members)| {
            !members.is_empty()
                && members.iter().all(|session_id| {
                    maps.sessions
                        .get(session_id)
                        .is_some_and(|entry| entry.channels.contains(restaurant_id))
                })
        });
        let sessions_ok = maps.sessions.iter().all(|(session_id, entry)| {
            entry.channels.iter().all(|restaurant_id| {
                maps.channels
                    .get(restaurant_id)
                    .is_some_and(|members| members.contains(session_id))
            })
        });
        channels_ok && sessions_ok
    }
}
