//! `PostgreSQL` implementation of [`AnalyticsStore`].
//!
//! Each method is a single parameterized statement against the shared
//! schema in `migrations/`. Filtering and grouping happen in SQL; ranking
//! and capping are left to the aggregator so every backend ranks the same
//! way. Hours of day are extracted in UTC.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tablecast_core::{AnalyticsStore, StoreError};
use tablecast_types::{
    HourCount, MenuItemId, OrderId, OrderStatus, PopularDish, RestaurantId, StaleOrder,
};

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Collaborator store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgAnalyticsStore {
    pool: PgPool,
}

impl PgAnalyticsStore {
    /// Create a store over an existing connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a store sharing `pool`'s connections.
    pub fn from_pool(pool: &PostgresPool) -> Self {
        Self::new(pool.pool().clone())
    }
}

/// A menu item joined with its recent delivered quantity.
#[derive(Debug, sqlx::FromRow)]
struct PopularDishRow {
    id: i64,
    name: String,
    price: Decimal,
    category: String,
    is_available: bool,
    total_ordered: i64,
}

impl TryFrom<PopularDishRow> for PopularDish {
    type Error = StoreError;

    fn try_from(row: PopularDishRow) -> Result<Self, Self::Error> {
        let total_ordered = u64::try_from(row.total_ordered).map_err(|e| {
            StoreError::Decode(format!("menu item {} quantity: {e}", row.id))
        })?;
        Ok(Self {
            id: MenuItemId::new(row.id),
            name: row.name,
            price: row.price,
            category: row.category,
            is_available: row.is_available,
            total_ordered,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HourCountRow {
    hour: i32,
    count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct StaleOrderRow {
    id: i64,
    restaurant_id: i64,
    created_at: DateTime<Utc>,
    status: String,
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::from(DbError::from(err))
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn fetch_menu_items_with_recent_order_counts(
        &self,
        restaurant_id: RestaurantId,
        lookback_days: u32,
    ) -> Result<Vec<PopularDish>, StoreError> {
        let days = i32::try_from(lookback_days).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, PopularDishRow>(
            r"SELECT m.id, m.name, m.price, m.category, m.is_available,
                     COALESCE(SUM(oi.quantity) FILTER (WHERE o.id IS NOT NULL), 0)::BIGINT AS total_ordered
              FROM menu_items m
              LEFT JOIN order_items oi ON oi.menu_item_id = m.id
              LEFT JOIN orders o
                     ON o.id = oi.order_id
                    AND o.status = 'DELIVERED'
                    AND o.created_at >= NOW() - make_interval(days => $2)
              WHERE m.restaurant_id = $1
              GROUP BY m.id",
        )
        .bind(restaurant_id.into_inner())
        .bind(days)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(PopularDish::try_from).collect()
    }

    async fn fetch_delivered_order_durations(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r"SELECT FLOOR(EXTRACT(EPOCH FROM (updated_at - created_at)) / 60)::BIGINT
              FROM orders
              WHERE restaurant_id = $1
                AND status = 'DELIVERED'
                AND created_at >= $2",
        )
        .bind(restaurant_id.into_inner())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn fetch_order_hour_counts(
        &self,
        restaurant_id: RestaurantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HourCount>, StoreError> {
        let rows = sqlx::query_as::<_, HourCountRow>(
            r"SELECT EXTRACT(HOUR FROM created_at AT TIME ZONE 'UTC')::INT AS hour,
                     COUNT(*) AS count
              FROM orders
              WHERE restaurant_id = $1
                AND created_at >= $2
              GROUP BY 1",
        )
        .bind(restaurant_id.into_inner())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let hour = u32::try_from(row.hour)
                    .map_err(|e| StoreError::Decode(format!("hour {}: {e}", row.hour)))?;
                let count = u64::try_from(row.count)
                    .map_err(|e| StoreError::Decode(format!("count {}: {e}", row.count)))?;
                Ok(HourCount { hour, count })
            })
            .collect()
    }

    async fn fetch_stale_orders(
        &self,
        threshold_minutes: u32,
    ) -> Result<Vec<StaleOrder>, StoreError> {
        let in_flight: Vec<&str> = OrderStatus::IN_FLIGHT
            .into_iter()
            .map(OrderStatus::as_str)
            .collect();
        let minutes = i32::try_from(threshold_minutes).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, StaleOrderRow>(
            r"SELECT id, restaurant_id, created_at, status::TEXT AS status
              FROM orders
              WHERE status::TEXT = ANY($1)
                AND created_at < NOW() - make_interval(mins => $2)
              ORDER BY created_at, id",
        )
        .bind(in_flight)
        .bind(minutes)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let status = OrderStatus::parse(&row.status).ok_or_else(|| {
                    StoreError::Decode(format!("order {} has unknown status {}", row.id, row.status))
                })?;
                Ok(StaleOrder {
                    id: OrderId::new(row.id),
                    restaurant_id: RestaurantId::new(row.restaurant_id),
                    created_at: row.created_at,
                    status,
                })
            })
            .collect()
    }

    async fn write_popularity_score(
        &self,
        menu_item_id: MenuItemId,
        score: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE menu_items
              SET popularity_score = $2
              WHERE id = $1",
        )
        .bind(menu_item_id.into_inner())
        .bind(i64::try_from(score).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("menu item {menu_item_id}")));
        }
        tracing::debug!(%menu_item_id, score, "Popularity score written");
        Ok(())
    }
}
