//! Mutation-to-snapshot orchestration.
//!
//! The [`RefreshPipeline`] ties the [`Aggregator`] to the [`Broadcaster`]:
//!
//! 1. [`RefreshPipeline::on_mutation`] pushes the raw domain event to the
//!    restaurant channel, then hands the restaurant to a background refresh.
//! 2. [`RefreshPipeline::refresh`] runs the four queries concurrently,
//!    writes popularity scores back best-effort, assembles the snapshot
//!    (degrading failed sections to empty defaults), and emits
//!    `analyticsUpdate`.
//!
//! The pipeline holds no state of its own. Re-running a refresh recomputes
//! the same snapshot from the store.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tablecast_types::{AnalyticsSnapshot, DomainEvent, EventKind, MenuItemId, RestaurantId};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregator::{AggregationFailed, Aggregator};
use crate::broadcast::{Broadcaster, EmitReport};
use crate::registry::SubscriptionRegistry;
use crate::store::StoreError;

/// Errors surfaced by the refresh pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// None of the four analytics queries succeeded. The empty snapshot was
    /// still broadcast.
    #[error("all analytics queries failed for restaurant {restaurant_id}")]
    AllQueriesFailed {
        /// The restaurant being refreshed.
        restaurant_id: RestaurantId,
        /// One entry per failed query.
        failures: Vec<AggregationFailed>,
    },

    /// `on_mutation` was handed a derived event.
    #[error("{kind} is not a mutation event")]
    NotAMutation {
        /// The rejected event kind.
        kind: EventKind,
    },
}

/// A popularity-score write failed. Logged and never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("popularity write for menu item {menu_item_id} failed: {cause}")]
pub struct PersistenceFailed {
    /// The item whose score was not written.
    pub menu_item_id: MenuItemId,
    /// What the store reported.
    #[source]
    pub cause: StoreError,
}

/// What one refresh did.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// The snapshot that was broadcast.
    pub snapshot: AnalyticsSnapshot,
    /// Queries that degraded to their empty default.
    pub degraded: Vec<AggregationFailed>,
    /// Popularity writes that did not land.
    pub persistence_failures: Vec<PersistenceFailed>,
    /// Delivery of the `analyticsUpdate`.
    pub report: EmitReport,
}

/// Handle for the background refresh started by
/// [`RefreshPipeline::on_mutation`].
pub type RefreshTask = JoinHandle<Result<RefreshOutcome, RefreshError>>;

/// What one `on_mutation` call did.
#[derive(Debug)]
pub struct MutationOutcome {
    /// Delivery of the raw event.
    pub report: EmitReport,
    /// The refresh started for the event's restaurant, if the kind triggers
    /// one. Callers are not expected to await it.
    pub refresh: Option<RefreshTask>,
}

/// Orchestrates "mutation happened, recompute, persist, broadcast".
#[derive(Debug, Clone)]
pub struct RefreshPipeline {
    aggregator: Aggregator,
    broadcaster: Broadcaster,
}

impl RefreshPipeline {
    /// Create a pipeline over `aggregator` and `broadcaster`.
    pub const fn new(aggregator: Aggregator, broadcaster: Broadcaster) -> Self {
        Self {
            aggregator,
            broadcaster,
        }
    }

    /// The aggregator used for recomputation.
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// The broadcaster used for delivery.
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The registry behind the broadcaster.
    pub const fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.broadcaster.registry()
    }

    /// Recompute and broadcast the analytics snapshot for `restaurant_id`.
    ///
    /// The snapshot is broadcast even when every query failed; failed
    /// sections carry empty defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::AllQueriesFailed`] when none of the four
    /// queries succeeded.
    pub async fn refresh(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<RefreshOutcome, RefreshError> {
        let sections = self.aggregator.collect(restaurant_id).await;
        let degraded = sections.failures();
        let all_failed = sections.all_failed();

        let persistence_failures = match sections.popular_dishes.as_ref() {
            Ok(dishes) => {
                let scores: Vec<(MenuItemId, u64)> =
                    dishes.iter().map(|d| (d.id, d.total_ordered)).collect();
                self.persist_popularity(&scores).await
            }
            Err(_) => Vec::new(),
        };

        let snapshot = sections.into_snapshot(restaurant_id, Utc::now());
        let report = self
            .broadcaster
            .emit(DomainEvent::analytics_updated(snapshot.clone()))
            .await;

        if all_failed {
            error!(%restaurant_id, "Every analytics query failed, broadcast empty snapshot");
            return Err(RefreshError::AllQueriesFailed {
                restaurant_id,
                failures: degraded,
            });
        }

        info!(
            %restaurant_id,
            degraded = degraded.len(),
            delivered = report.delivered,
            "Analytics refreshed"
        );
        Ok(RefreshOutcome {
            snapshot,
            degraded,
            persistence_failures,
            report,
        })
    }

    /// Assemble the snapshot for `restaurant_id` without writing scores or
    /// broadcasting.
    pub async fn snapshot(&self, restaurant_id: RestaurantId) -> AnalyticsSnapshot {
        self.aggregator
            .collect(restaurant_id)
            .await
            .into_snapshot(restaurant_id, Utc::now())
    }

    /// Start a refresh on its own task.
    pub fn spawn_refresh(self: &Arc<Self>, restaurant_id: RestaurantId) -> RefreshTask {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.refresh(restaurant_id).await })
    }

    /// Handle a committed mutation: push the raw event to its restaurant,
    /// then refresh that restaurant in the background.
    ///
    /// The raw event is queued to every subscriber before the refresh task
    /// exists, so each subscriber sees it ahead of the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::NotAMutation`] for `analyticsUpdate` events.
    pub async fn on_mutation(
        self: &Arc<Self>,
        event: DomainEvent,
    ) -> Result<MutationOutcome, RefreshError> {
        let kind = event.kind();
        if !kind.is_mutation() {
            return Err(RefreshError::NotAMutation { kind });
        }
        let restaurant_id = event.restaurant_id();
        debug!(%restaurant_id, event = %kind, "Mutation received");

        let report = self.broadcaster.emit(event).await;
        let refresh = kind
            .triggers_refresh()
            .then(|| self.spawn_refresh(restaurant_id));
        Ok(MutationOutcome { report, refresh })
    }

    async fn persist_popularity(&self, scores: &[(MenuItemId, u64)]) -> Vec<PersistenceFailed> {
        let store = self.aggregator.store();
        let writes = scores.iter().map(|&(menu_item_id, score)| async move {
            store
                .write_popularity_score(menu_item_id, score)
                .await
                .map_err(|cause| PersistenceFailed {
                    menu_item_id,
                    cause,
                })
        });
        join_all(writes)
            .await
            .into_iter()
            .filter_map(Result::err)
            .inspect(|failure| warn!(error = %failure, "Popularity write failed"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta};
    use rust_decimal::Decimal;
    use tablecast_types::{
        Delivery, DeliveryId, DeliveryStatus, EventPayload, HourCount, MenuItem, OrderId,
        PopularDish, SessionId, StaleOrder,
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::aggregator::AggregatorSettings;
    use crate::memory::MemoryStore;
    use crate::store::AnalyticsStore;

    /// Wraps a [`MemoryStore`] and fails reads and/or writes on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn check(flag: &AtomicBool) -> Result<(), StoreError> {
            if flag.load(Ordering::SeqCst) {
                Err(StoreError::Backend(String::from("connection refused")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AnalyticsStore for FlakyStore {
        async fn fetch_menu_items_with_recent_order_counts(
            &self,
            restaurant_id: RestaurantId,
            lookback_days: u32,
        ) -> Result<Vec<PopularDish>, StoreError> {
            Self::check(&self.fail_reads)?;
            self.inner
                .fetch_menu_items_with_recent_order_counts(restaurant_id, lookback_days)
                .await
        }

        async fn fetch_delivered_order_durations(
            &self,
            restaurant_id: RestaurantId,
            since: DateTime<Utc>,
        ) -> Result<Vec<i64>, StoreError> {
            Self::check(&self.fail_reads)?;
            self.inner
                .fetch_delivered_order_durations(restaurant_id, since)
                .await
        }

        async fn fetch_order_hour_counts(
            &self,
            restaurant_id: RestaurantId,
            since: DateTime<Utc>,
        ) -> Result<Vec<HourCount>, StoreError> {
            Self::check(&self.fail_reads)?;
            self.inner.fetch_order_hour_counts(restaurant_id, since).await
        }

        async fn fetch_stale_orders(
            &self,
            threshold_minutes: u32,
        ) -> Result<Vec<StaleOrder>, StoreError> {
            Self::check(&self.fail_reads)?;
            self.inner.fetch_stale_orders(threshold_minutes).await
        }

        async fn write_popularity_score(
            &self,
            menu_item_id: MenuItemId,
            score: u64,
        ) -> Result<(), StoreError> {
            Self::check(&self.fail_writes)?;
            self.inner.write_popularity_score(menu_item_id, score).await
        }
    }

    fn menu_item(id: i64, restaurant: i64) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id: MenuItemId::new(id),
            restaurant_id: RestaurantId::new(restaurant),
            name: format!("dish-{id}"),
            description: None,
            price: Decimal::new(1200, 2),
            category: String::from("Mains"),
            image_url: None,
            is_available: true,
            popularity_score: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn pipeline_over(store: Arc<dyn AnalyticsStore>) -> (Arc<RefreshPipeline>, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let pipeline = RefreshPipeline::new(
            Aggregator::new(store, AggregatorSettings::default()),
            Broadcaster::new(Arc::clone(&registry)),
        );
        (Arc::new(pipeline), registry)
    }

    async fn watcher(
        registry: &SubscriptionRegistry,
        restaurant: i64,
    ) -> mpsc::Receiver<Arc<DomainEvent>> {
        let session = SessionId::new();
        let (tx, rx) = mpsc::channel(16);
        registry.attach(session, tx).await;
        let _ = registry.subscribe(session, RestaurantId::new(restaurant)).await;
        rx
    }

    #[tokio::test]
    async fn refresh_broadcasts_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_menu_item(menu_item(1, 5)).await;
        let (pipeline, registry) = pipeline_over(store);
        let mut rx = watcher(&registry, 5).await;

        let outcome = pipeline.refresh(RestaurantId::new(5)).await;
        assert!(outcome.is_ok());

        let event = rx.try_recv().ok();
        let kind = event.as_ref().map(|e| e.kind());
        assert_eq!(kind, Some(EventKind::AnalyticsUpdated));
        if let Some(EventPayload::AnalyticsUpdated(snapshot)) = event.as_ref().map(|e| e.payload()) {
            assert_eq!(snapshot.restaurant_id, RestaurantId::new(5));
            assert_eq!(snapshot.popular_dishes.len(), 1);
            assert!(snapshot.summary.degraded_sections.is_empty());
        } else {
            panic!("expected analytics payload");
        }
    }

    #[tokio::test]
    async fn all_failures_still_broadcast_empty_snapshot() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let (pipeline, registry) = pipeline_over(store);
        let mut rx = watcher(&registry, 5).await;

        let result = pipeline.refresh(RestaurantId::new(5)).await;
        match result {
            Err(RefreshError::AllQueriesFailed { failures, .. }) => assert_eq!(failures.len(), 4),
            other => panic!("expected AllQueriesFailed, got {other:?}"),
        }
        let event = rx.try_recv().ok();
        assert_eq!(event.map(|e| e.kind()), Some(EventKind::AnalyticsUpdated));
    }

    #[tokio::test]
    async fn write_failures_do_not_abort_refresh() {
        let store = Arc::new(FlakyStore::default());
        store.inner.upsert_menu_item(menu_item(1, 5)).await;
        store.inner.upsert_menu_item(menu_item(2, 5)).await;
        store.fail_writes.store(true, Ordering::SeqCst);
        let (pipeline, _registry) = pipeline_over(store);

        let outcome = pipeline.refresh(RestaurantId::new(5)).await;
        let failures = outcome.map(|o| o.persistence_failures.len()).ok();
        assert_eq!(failures, Some(2));
    }

    #[tokio::test]
    async fn refresh_persists_popularity_scores() {
        let store = Arc::new(MemoryStore::new());
        let mut item = menu_item(1, 5);
        item.popularity_score = 99;
        store.upsert_menu_item(item).await;
        let (pipeline, _registry) = pipeline_over(Arc::clone(&store) as Arc<dyn AnalyticsStore>);

        assert!(pipeline.refresh(RestaurantId::new(5)).await.is_ok());
        let stored = store.menu_item(MenuItemId::new(1)).await;
        assert_eq!(stored.map(|i| i.popularity_score), Some(0));
    }

    #[tokio::test]
    async fn raw_event_precedes_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let (pipeline, registry) = pipeline_over(store);
        let mut rx = watcher(&registry, 5).await;

        let event = DomainEvent::menu_item_created(menu_item(3, 5));
        let outcome = pipeline.on_mutation(event).await;
        let task = outcome.ok().and_then(|o| o.refresh);
        assert!(task.is_some());
        if let Some(task) = task {
            let _ = task.await;
        }

        let first = rx.recv().await.map(|e| e.kind());
        let second = rx.recv().await.map(|e| e.kind());
        assert_eq!(first, Some(EventKind::MenuItemCreated));
        assert_eq!(second, Some(EventKind::AnalyticsUpdated));
    }

    #[tokio::test]
    async fn delivery_updates_skip_refresh() {
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _registry) = pipeline_over(store);
        let now = Utc::now();
        let delivery = Delivery {
            id: DeliveryId::new(1),
            order_id: OrderId::new(1),
            restaurant_id: RestaurantId::new(5),
            status: DeliveryStatus::InTransit,
            driver_name: Some(String::from("Sam")),
            driver_phone: Some(String::from("555-0101")),
            current_location: None,
            estimated_delivery_time: now.checked_add_signed(TimeDelta::minutes(20)),
            pickup_time: Some(now),
            actual_delivery_time: None,
            created_at: now,
            updated_at: now,
        };

        let outcome = pipeline
            .on_mutation(DomainEvent::delivery_status_updated(delivery))
            .await;
        assert!(outcome.is_ok_and(|o| o.refresh.is_none()));
    }

    #[tokio::test]
    async fn rejects_analytics_update_as_mutation() {
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _registry) = pipeline_over(store);
        let snapshot = pipeline.snapshot(RestaurantId::new(5)).await;

        let result = pipeline
            .on_mutation(DomainEvent::analytics_updated(snapshot))
            .await;
        assert!(matches!(
            result,
            Err(RefreshError::NotAMutation {
                kind: EventKind::AnalyticsUpdated
            })
        ));
    }
}
