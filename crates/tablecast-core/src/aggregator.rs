//! Read-only analytics over the collaborator store.
//!
//! Four independent queries, each scoped to one restaurant except the
//! stale-order scan, which is global:
//!
//! | Query | Source read | Ranking |
//! |-------|-------------|---------|
//! | popular dishes | menu items + delivered units, last 30 days | units desc, id asc, available only, top 5 |
//! | delivery time | delivered order durations in the window | mean, 0 when empty |
//! | peak times | order counts per hour, last 30 days | count desc, hour asc, top 5 |
//! | stale orders | in-flight orders older than the threshold | oldest first |
//!
//! The store does the filtering; ranking, capping, and averaging happen
//! here in pure functions so they behave identically over every backend.
//! Each query fails on its own with an [`AggregationFailed`] naming it.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use tablecast_types::{
    AnalyticsQuery, AnalyticsSnapshot, AnalyticsSummary, DeliveryTimeStats, HourCount, PeakHour,
    PopularDish, RestaurantId, StaleOrder, TimeWindow,
};
use tracing::warn;

use crate::config::AnalyticsConfig;
use crate::store::{AnalyticsStore, StoreError};

/// One analytics query could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{query} query failed: {cause}")]
pub struct AggregationFailed {
    /// The query that failed.
    pub query: AnalyticsQuery,
    /// What the store reported.
    #[source]
    pub cause: StoreError,
}

/// Parameters of the four queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Days of delivered orders counted towards popularity.
    pub popular_lookback_days: u32,
    /// Maximum dishes returned.
    pub popular_limit: usize,
    /// Days of orders bucketed into hours.
    pub peak_lookback_days: u32,
    /// Maximum hour buckets returned.
    pub peak_limit: usize,
    /// Minutes after which an in-flight order is stale.
    pub stale_threshold_minutes: u32,
    /// Window used for the snapshot's delivery-time section.
    pub delivery_window: TimeWindow,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

impl From<&AnalyticsConfig> for AggregatorSettings {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            popular_lookback_days: config.popular_lookback_days,
            popular_limit: config.popular_limit,
            peak_lookback_days: config.peak_lookback_days,
            peak_limit: config.peak_limit,
            stale_threshold_minutes: config.stale_threshold_minutes,
            delivery_window: config.default_delivery_window,
        }
    }
}

/// Results of the four queries for one restaurant, each kept separately so
/// a failure in one leaves the others intact.
#[derive(Debug, Clone)]
pub struct SnapshotSections {
    /// Ranked popular dishes.
    pub popular_dishes: Result<Vec<PopularDish>, AggregationFailed>,
    /// Mean delivery time over the configured window.
    pub delivery_time: Result<DeliveryTimeStats, AggregationFailed>,
    /// Ranked peak hours.
    pub peak_times: Result<Vec<PeakHour>, AggregationFailed>,
    /// Global stale orders, oldest first.
    pub stale_orders: Result<Vec<StaleOrder>, AggregationFailed>,
    /// Window the delivery section was asked for, used for its empty default.
    pub delivery_window: TimeWindow,
}

impl SnapshotSections {
    /// Failures among the four sections, in section order.
    pub fn failures(&self) -> Vec<AggregationFailed> {
        [
            self.popular_dishes.as_ref().err(),
            self.delivery_time.as_ref().err(),
            self.peak_times.as_ref().err(),
            self.stale_orders.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    /// Whether every query failed.
    pub fn all_failed(&self) -> bool {
        self.failures().len() == AnalyticsQuery::ALL.len()
    }

    /// Build the snapshot for `restaurant_id`.
    ///
    /// A failed section contributes its empty default and is listed in
    /// `summary.degraded_sections`. The global stale-order list is narrowed
    /// to this restaurant here.
    pub fn into_snapshot(
        self,
        restaurant_id: RestaurantId,
        timestamp: DateTime<Utc>,
    ) -> AnalyticsSnapshot {
        let degraded_sections: Vec<AnalyticsQuery> =
            self.failures().into_iter().map(|f| f.query).collect();

        let popular_dishes = self.popular_dishes.unwrap_or_default();
        let delivery_time = self
            .delivery_time
            .unwrap_or_else(|_| DeliveryTimeStats::empty(self.delivery_window));
        let peak_times = self.peak_times.unwrap_or_default();
        let stale_orders: Vec<StaleOrder> = self
            .stale_orders
            .unwrap_or_default()
            .into_iter()
            .filter(|order| order.restaurant_id == restaurant_id)
            .collect();

        let summary = AnalyticsSummary {
            top_dish: popular_dishes.first().map(|dish| dish.name.clone()),
            total_items_sold: popular_dishes
                .iter()
                .fold(0_u64, |acc, dish| acc.saturating_add(dish.total_ordered)),
            average_delivery_minutes: delivery_time.average_delivery_time,
            busiest_hour: peak_times.first().map(|peak| peak.hour),
            stale_order_count: u64::try_from(stale_orders.len()).unwrap_or(u64::MAX),
            degraded_sections,
        };

        AnalyticsSnapshot {
            restaurant_id,
            timestamp,
            popular_dishes,
            delivery_time,
            peak_times,
            stale_orders,
            summary,
        }
    }
}

/// Runs the analytics queries against a collaborator store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn AnalyticsStore>,
    settings: AggregatorSettings,
}

impl core::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Aggregator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Create an aggregator over `store`.
    pub fn new(store: Arc<dyn AnalyticsStore>, settings: AggregatorSettings) -> Self {
        Self { store, settings }
    }

    /// Query parameters in use.
    pub const fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// The store the queries read from.
    pub fn store(&self) -> &Arc<dyn AnalyticsStore> {
        &self.store
    }

    /// Top available dishes by units sold on delivered orders.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationFailed`] tagged [`AnalyticsQuery::PopularDishes`]
    /// if the store read fails.
    pub async fn popular_dishes(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<PopularDish>, AggregationFailed> {
        let candidates = self
            .store
            .fetch_menu_items_with_recent_order_counts(
                restaurant_id,
                self.settings.popular_lookback_days,
            )
            .await
            .map_err(|cause| failed(AnalyticsQuery::PopularDishes, Some(restaurant_id), cause))?;
        Ok(rank_popular_dishes(candidates, self.settings.popular_limit))
    }

    /// Mean minutes from placement to delivery over `window`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationFailed`] tagged [`AnalyticsQuery::DeliveryTime`]
    /// if the store read fails.
    pub async fn average_delivery_time(
        &self,
        restaurant_id: RestaurantId,
        window: TimeWindow,
    ) -> Result<DeliveryTimeStats, AggregationFailed> {
        let since = lookback_start(Utc::now(), Some(window.lookback()));
        let durations = self
            .store
            .fetch_delivered_order_durations(restaurant_id, since)
            .await
            .map_err(|cause| failed(AnalyticsQuery::DeliveryTime, Some(restaurant_id), cause))?;
        Ok(DeliveryTimeStats {
            average_delivery_time: average_minutes(&durations),
            time_window: window,
            unit: DeliveryTimeStats::UNIT.to_owned(),
            order_count: u64::try_from(durations.len()).unwrap_or(u64::MAX),
        })
    }

    /// Busiest ordering hours.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationFailed`] tagged [`AnalyticsQuery::PeakTimes`]
    /// if the store read fails.
    pub async fn peak_ordering_times(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<PeakHour>, AggregationFailed> {
        let since = lookback_start(
            Utc::now(),
            TimeDelta::try_days(i64::from(self.settings.peak_lookback_days)),
        );
        let counts = self
            .store
            .fetch_order_hour_counts(restaurant_id, since)
            .await
            .map_err(|cause| failed(AnalyticsQuery::PeakTimes, Some(restaurant_id), cause))?;
        Ok(rank_peak_hours(counts, self.settings.peak_limit))
    }

    /// In-flight orders of every restaurant older than `threshold_minutes`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationFailed`] tagged [`AnalyticsQuery::StaleOrders`]
    /// if the store read fails.
    pub async fn stale_orders(
        &self,
        threshold_minutes: u32,
    ) -> Result<Vec<StaleOrder>, AggregationFailed> {
        let mut orders = self
            .store
            .fetch_stale_orders(threshold_minutes)
            .await
            .map_err(|cause| failed(AnalyticsQuery::StaleOrders, None, cause))?;
        orders.sort_by_key(|order| (order.created_at, order.id));
        Ok(orders)
    }

    /// Run all four queries concurrently for `restaurant_id`.
    pub async fn collect(&self, restaurant_id: RestaurantId) -> SnapshotSections {
        let window = self.settings.delivery_window;
        let (popular_dishes, delivery_time, peak_times, stale_orders) = tokio::join!(
            self.popular_dishes(restaurant_id),
            self.average_delivery_time(restaurant_id, window),
            self.peak_ordering_times(restaurant_id),
            self.stale_orders(self.settings.stale_threshold_minutes),
        );
        SnapshotSections {
            popular_dishes,
            delivery_time,
            peak_times,
            stale_orders,
            delivery_window: window,
        }
    }
}

/// Log a failed query and wrap its cause. `restaurant_id` is `None` for
/// the global stale-orders query.
fn failed(
    query: AnalyticsQuery,
    restaurant_id: Option<RestaurantId>,
    cause: StoreError,
) -> AggregationFailed {
    warn!(
        restaurant_id = restaurant_id.map(RestaurantId::into_inner),
        %query,
        error = %cause,
        "Analytics query failed"
    );
    AggregationFailed { query, cause }
}

/// `now - lookback`, clamped to the earliest representable instant.
fn lookback_start(now: DateTime<Utc>, lookback: Option<TimeDelta>) -> DateTime<Utc> {
    lookback
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Keep available dishes, order by units sold (desc) then id (asc), cap at
/// `limit`.
pub fn rank_popular_dishes(candidates: Vec<PopularDish>, limit: usize) -> Vec<PopularDish> {
    let mut ranked: Vec<PopularDish> = candidates
        .into_iter()
        .filter(|dish| dish.is_available)
        .collect();
    ranked.sort_by_key(|dish| (Reverse(dish.total_ordered), dish.id));
    ranked.truncate(limit);
    ranked
}

/// Mean of `durations` in minutes, rounded to two decimal places. Zero
/// when empty.
pub fn average_minutes(durations: &[i64]) -> Decimal {
    if durations.is_empty() {
        return Decimal::ZERO;
    }
    let total = durations
        .iter()
        .fold(Decimal::ZERO, |acc, &minutes| {
            acc.checked_add(Decimal::from(minutes)).unwrap_or(acc)
        });
    total
        .checked_div(Decimal::from(durations.len()))
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
        .normalize()
}

/// Order hour buckets by count (desc) then hour (asc), cap at `limit`, and
/// label each one.
pub fn rank_peak_hours(counts: Vec<HourCount>, limit: usize) -> Vec<PeakHour> {
    let mut counts: Vec<HourCount> = counts
        .into_iter()
        .filter(|bucket| bucket.hour < 24 && bucket.count > 0)
        .collect();
    counts.sort_by_key(|bucket| (Reverse(bucket.count), bucket.hour));
    counts
        .into_iter()
        .take(limit)
        .map(|bucket| PeakHour {
            hour: bucket.hour,
            order_count: bucket.count,
            time_range: hour_label(bucket.hour),
        })
        .collect()
}

/// `"H:00 - H+1:00"`.
pub fn hour_label(hour: u32) -> String {
    format!("{hour}:00 - {}:00", hour.saturating_add(1))
}
