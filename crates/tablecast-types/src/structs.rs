//! Record structs: the collaborator store's domain rows and the analytics
//! projections computed over them.
//!
//! Field names serialize in `camelCase`, which is what the viewer
//! dashboard consumes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AnalyticsQuery, DeliveryStatus, OrderStatus, TimeWindow};
use crate::ids::{DeliveryId, MenuItemId, OrderId, OrderItemId, RestaurantId, UserId};

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MenuItem {
    /// Store key.
    pub id: MenuItemId,
    /// Owning restaurant.
    pub restaurant_id: RestaurantId,
    /// Display name, unique within the restaurant.
    pub name: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Unit price.
    #[ts(type = "string")]
    pub price: Decimal,
    /// Menu section, e.g. `Mains`.
    pub category: String,
    /// Optional picture.
    pub image_url: Option<String>,
    /// Whether the item can currently be ordered.
    pub is_available: bool,
    /// Units sold over the popularity lookback, written back by each refresh.
    pub popularity_score: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OrderItem {
    /// Store key.
    pub id: OrderItemId,
    /// Dish ordered.
    pub menu_item_id: MenuItemId,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price captured at order time.
    #[ts(type = "string")]
    pub price: Decimal,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Order {
    /// Store key.
    pub id: OrderId,
    /// Restaurant fulfilling the order.
    pub restaurant_id: RestaurantId,
    /// Customer.
    pub user_id: UserId,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Sum of line prices.
    #[ts(type = "string")]
    pub total_amount: Decimal,
    /// Drop-off address.
    pub delivery_address: String,
    /// Customer contact number.
    pub phone_number: String,
    /// Payment method label, e.g. `CARD`.
    pub payment_method: String,
    /// Free-form customer notes.
    pub notes: Option<String>,
    /// Line items.
    pub items: Vec<OrderItem>,
    /// Placement time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// A delivery run for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Delivery {
    /// Store key.
    pub id: DeliveryId,
    /// Order being delivered.
    pub order_id: OrderId,
    /// Restaurant the order belongs to.
    pub restaurant_id: RestaurantId,
    /// Current delivery status.
    pub status: DeliveryStatus,
    /// Driver name, once assigned.
    pub driver_name: Option<String>,
    /// Driver contact number.
    pub driver_phone: Option<String>,
    /// Last reported position.
    pub current_location: Option<String>,
    /// Promised arrival.
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    /// When the driver collected the order.
    pub pickup_time: Option<DateTime<Utc>>,
    /// When the order was handed over.
    pub actual_delivery_time: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Payload of a `menuItemDeleted` event: only the id survives deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeletedMenuItem {
    /// Id of the removed menu item.
    pub id: MenuItemId,
}

// ---------------------------------------------------------------------------
// Analytics projections
// ---------------------------------------------------------------------------

/// A menu item with the units sold in the popularity lookback.
///
/// The collaborator store returns one per menu item of the restaurant
/// (`total_ordered` is 0 when nothing sold); the aggregator ranks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PopularDish {
    /// Menu item.
    pub id: MenuItemId,
    /// Display name.
    pub name: String,
    /// Unit price.
    #[ts(type = "string")]
    pub price: Decimal,
    /// Menu section.
    pub category: String,
    /// Whether the item can currently be ordered.
    pub is_available: bool,
    /// Units sold across delivered orders in the lookback.
    pub total_ordered: u64,
}

/// Mean order-to-delivery time over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DeliveryTimeStats {
    /// Mean minutes from placement to delivery, rounded to two places.
    #[ts(type = "string")]
    pub average_delivery_time: Decimal,
    /// Window the mean covers.
    pub time_window: TimeWindow,
    /// Always `minutes`.
    pub unit: String,
    /// Number of delivered orders averaged.
    pub order_count: u64,
}

impl DeliveryTimeStats {
    /// Unit label carried on every delivery-time section.
    pub const UNIT: &'static str = "minutes";

    /// The section reported when nothing was delivered in the window.
    pub fn empty(time_window: TimeWindow) -> Self {
        Self {
            average_delivery_time: Decimal::ZERO,
            time_window,
            unit: Self::UNIT.to_owned(),
            order_count: 0,
        }
    }
}

/// Raw per-hour order count from the collaborator store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HourCount {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Orders placed in that hour.
    pub count: u64,
}

/// One ranked hour bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PeakHour {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Orders placed in that hour over the lookback.
    pub order_count: u64,
    /// Human-readable range, e.g. `9:00 - 10:00`.
    pub time_range: String,
}

/// An in-flight order older than the stale threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StaleOrder {
    /// Order.
    pub id: OrderId,
    /// Restaurant fulfilling it.
    pub restaurant_id: RestaurantId,
    /// Placement time.
    pub created_at: DateTime<Utc>,
    /// Current in-flight status.
    pub status: OrderStatus,
}

/// Scalar roll-up of the four snapshot sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AnalyticsSummary {
    /// Name of the best-selling dish, if any dish is listed.
    pub top_dish: Option<String>,
    /// Units sold across the listed popular dishes.
    pub total_items_sold: u64,
    /// Mean delivery minutes copied from the delivery section.
    #[ts(type = "string")]
    pub average_delivery_minutes: Decimal,
    /// Busiest hour of day, if any order was placed.
    pub busiest_hour: Option<u32>,
    /// Number of stale orders for this restaurant.
    pub stale_order_count: u64,
    /// Sections that fell back to an empty default because their query failed.
    pub degraded_sections: Vec<AnalyticsQuery>,
}

/// Complete recomputed analytics for one restaurant at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AnalyticsSnapshot {
    /// Restaurant the snapshot describes.
    pub restaurant_id: RestaurantId,
    /// When the snapshot was assembled.
    pub timestamp: DateTime<Utc>,
    /// Best sellers, highest volume first, at most five.
    pub popular_dishes: Vec<PopularDish>,
    /// Mean delivery time over the configured window.
    pub delivery_time: DeliveryTimeStats,
    /// Busiest hours, highest count first, at most five.
    pub peak_times: Vec<PeakHour>,
    /// This restaurant's stale orders, oldest first.
    pub stale_orders: Vec<StaleOrder>,
    /// Roll-up of the sections above.
    pub summary: AnalyticsSummary,
}
