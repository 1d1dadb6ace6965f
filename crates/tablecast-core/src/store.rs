//! The collaborator-store seam.
//!
//! Restaurants, menus, orders, and deliveries are owned by an external CRUD
//! service. The analytics core only needs the handful of reads and the one
//! write declared by [`AnalyticsStore`]; everything else about persistence
//! is behind this trait. `tablecast-db` implements it over `PostgreSQL`,
//! and [`MemoryStore`](crate::memory::MemoryStore) implements it in-process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablecast_types::{HourCount, MenuItemId, PopularDish, RestaurantId, StaleOrder};

/// Errors reported by a collaborator store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not execute the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A row came back in a shape the core cannot represent.
    #[error("store returned malformed data: {0}")]
    Decode(String),

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Reads and writes the analytics core performs against the collaborator
/// store.
///
/// All methods are independent: the core issues them concurrently and
/// performs no transaction coordination across them.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Every menu item of the restaurant with the units sold on orders
    /// that are `DELIVERED` and were created within the last
    /// `lookback_days`. Items that sold nothing are returned with
    /// `total_ordered == 0`. Order is unspecified.
    async fn fetch_menu_items_with_recent_order_counts(
        &self,
        restaurant_id: RestaurantId,
        lookback_days: u32,
    ) -> Result<Vec<PopularDish>, StoreError>;

    /// Whole minutes between creation and last update of each `DELIVERED`
    /// order of the restaurant created at or after `since`.
    async fn fetch_delivered_order_durations(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, StoreError>;

    /// Orders of the restaurant created at or after `since`, counted per
    /// hour of day. Hours with no orders may be omitted. Order is
    /// unspecified.
    async fn fetch_order_hour_counts(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HourCount>, StoreError>;

    /// In-flight orders of every restaurant created more than
    /// `threshold_minutes` ago.
    async fn fetch_stale_orders(&self, threshold_minutes: u32)
    -> Result<Vec<StaleOrder>, StoreError>;

    /// Overwrite a menu item's popularity score.
    async fn write_popularity_score(
        &self,
        menu_item_id: MenuItemId,
        score: u64,
    ) -> Result<(), StoreError>;
}
