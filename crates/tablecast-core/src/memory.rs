//! In-process collaborator store.
//!
//! [`MemoryStore`] keeps menu items and orders in ordered maps behind a
//! [`RwLock`] and answers the [`AnalyticsStore`] queries by scanning them.
//! It backs the `memory` store mode of the server binary and the test
//! suites. Hours of day are taken in UTC.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tablecast_types::{
    DomainEvent, EventPayload, HourCount, MenuItem, MenuItemId, Order, OrderId, OrderStatus,
    PopularDish, RestaurantId, StaleOrder,
};
use tokio::sync::RwLock;

use crate::store::{AnalyticsStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    menu_items: BTreeMap<MenuItemId, MenuItem>,
    orders: BTreeMap<OrderId, Order>,
}

/// Collaborator store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a menu item.
    pub async fn upsert_menu_item(&self, item: MenuItem) {
        self.tables.write().await.menu_items.insert(item.id, item);
    }

    /// Remove a menu item, returning it if it existed.
    pub async fn remove_menu_item(&self, id: MenuItemId) -> Option<MenuItem> {
        self.tables.write().await.menu_items.remove(&id)
    }

    /// Look up a menu item.
    pub async fn menu_item(&self, id: MenuItemId) -> Option<MenuItem> {
        self.tables.read().await.menu_items.get(&id).cloned()
    }

    /// Insert or replace an order.
    pub async fn upsert_order(&self, order: Order) {
        self.tables.write().await.orders.insert(order.id, order);
    }

    /// Move an order to `status`, stamping `updated_at`. Returns the
    /// updated order.
    pub async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Option<Order> {
        let mut tables = self.tables.write().await;
        let order = tables.orders.get_mut(&id)?;
        order.status = status;
        order.updated_at = at;
        Some(order.clone())
    }

    /// Mirror a committed mutation into the tables, so a `memory` deployment
    /// sees the records the CRUD service posts. Returns `true` if a row
    /// changed.
    ///
    /// Deliveries are not tracked and analytics updates carry no rows.
    pub async fn apply(&self, event: &DomainEvent) -> bool {
        let mut tables = self.tables.write().await;
        match event.payload() {
            EventPayload::OrderCreated(order) | EventPayload::OrderStatusUpdated(order) => {
                tables.orders.insert(order.id, order.clone());
                true
            }
            EventPayload::MenuItemCreated(item)
            | EventPayload::MenuItemUpdated(item)
            | EventPayload::MenuItemAvailabilityToggled(item) => {
                tables.menu_items.insert(item.id, item.clone());
                true
            }
            EventPayload::MenuItemDeleted(deleted) => {
                tables.menu_items.remove(&deleted.id).is_some()
            }
            EventPayload::DeliveryStatusUpdated(_) | EventPayload::AnalyticsUpdated(_) => false,
        }
    }
}

/// `now - delta`, clamped to the earliest representable instant.
fn cutoff(now: DateTime<Utc>, delta: Option<TimeDelta>) -> DateTime<Utc> {
    delta
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn fetch_menu_items_with_recent_order_counts(
        &self,
        restaurant_id: RestaurantId,
        lookback_days: u32,
    ) -> Result<Vec<PopularDish>, StoreError> {
        let since = cutoff(Utc::now(), TimeDelta::try_days(i64::from(lookback_days)));
        let tables = self.tables.read().await;

        let mut sold: BTreeMap<MenuItemId, u64> = BTreeMap::new();
        for order in tables.orders.values().filter(|o| {
            o.restaurant_id == restaurant_id
                && o.status == OrderStatus::Delivered
                && o.created_at >= since
        }) {
            for line in &order.items {
                let entry = sold.entry(line.menu_item_id).or_insert(0);
                *entry = entry.saturating_add(u64::from(line.quantity));
            }
        }

        Ok(tables
            .menu_items
            .values()
            .filter(|item| item.restaurant_id == restaurant_id)
            .map(|item| PopularDish {
                id: item.id,
                name: item.name.clone(),
                price: item.price,
                category: item.category.clone(),
                is_available: item.is_available,
                total_ordered: sold.get(&item.id).copied().unwrap_or(0),
            })
            .collect())
    }

    async fn fetch_delivered_order_durations(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| {
                o.restaurant_id == restaurant_id
                    && o.status == OrderStatus::Delivered
                    && o.created_at >= since
            })
            .map(|o| o.updated_at.signed_duration_since(o.created_at).num_minutes())
            .collect())
    }

    async fn fetch_order_hour_counts(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HourCount>, StoreError> {
        let tables = self.tables.read().await;
        let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
        for order in tables
            .orders
            .values()
            .filter(|o| o.restaurant_id == restaurant_id && o.created_at >= since)
        {
            let entry = buckets.entry(order.created_at.hour()).or_insert(0);
            *entry = entry.saturating_add(1);
        }
        Ok(buckets
            .into_iter()
            .map(|(hour, count)| HourCount { hour, count })
            .collect())
    }

    async fn fetch_stale_orders(
        &self,
        threshold_minutes: u32,
    ) -> Result<Vec<StaleOrder>, StoreError> {
        let threshold = cutoff(
            Utc::now(),
            TimeDelta::try_minutes(i64::from(threshold_minutes)),
        );
        let tables = self.tables.read().await;
        let mut stale: Vec<StaleOrder> = tables
            .orders
            .values()
            .filter(|o| o.status.is_in_flight() && o.created_at < threshold)
            .map(|o| StaleOrder {
                id: o.id,
                restaurant_id: o.restaurant_id,
                created_at: o.created_at,
                status: o.status,
            })
            .collect();
        stale.sort_by_key(|o| (o.created_at, o.id));
        Ok(stale)
    }

    async fn write_popularity_score(
        &self,
        menu_item_id: MenuItemId,
        score: u64,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let item = tables
            .menu_items
            .get_mut(&menu_item_id)
            .ok_or_else(|| StoreError::NotFound(format!("menu item {menu_item_id}")))?;
        item.popularity_score = score;
        Ok(())
    }
}
