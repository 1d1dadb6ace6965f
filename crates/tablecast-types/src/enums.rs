//! Enumeration types shared across the workspace.
//!
//! Status enums serialize in `SCREAMING_SNAKE_CASE` to match the values the
//! collaborator store persists (`PENDING`, `OUT_FOR_DELIVERY`, ...). The
//! remaining enums use the lower camel-case names that appear on the
//! viewer wire protocol.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Order lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum OrderStatus {
    /// Placed, not yet acknowledged by the kitchen.
    Pending,
    /// Acknowledged by the restaurant.
    Confirmed,
    /// Being cooked.
    Preparing,
    /// Cooked and waiting for a driver or customer.
    ReadyForPickup,
    /// On the road.
    OutForDelivery,
    /// Handed to the customer.
    Delivered,
    /// Abandoned before completion.
    Cancelled,
}

impl OrderStatus {
    /// Statuses of orders that are still in flight.
    ///
    /// An in-flight order older than the stale threshold is reported as
    /// stale.
    pub const IN_FLIGHT: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::ReadyForPickup,
        Self::OutForDelivery,
    ];

    /// Whether the order has not yet reached a terminal status.
    pub const fn is_in_flight(self) -> bool {
        !matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The persisted representation of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::ReadyForPickup => "READY_FOR_PICKUP",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the persisted representation of a status.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PREPARING" => Some(Self::Preparing),
            "READY_FOR_PICKUP" => Some(Self::ReadyForPickup),
            "OUT_FOR_DELIVERY" => Some(Self::OutForDelivery),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Status of a delivery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum DeliveryStatus {
    /// A driver has been assigned.
    Assigned,
    /// The driver collected the order.
    PickedUp,
    /// On the way to the customer.
    InTransit,
    /// Close to the drop-off point.
    Nearby,
    /// Handed over.
    Delivered,
}

// ---------------------------------------------------------------------------
// Analytics parameters
// ---------------------------------------------------------------------------

/// Lookback window for the average delivery time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum TimeWindow {
    /// The last 24 hours.
    Day,
    /// The last 7 days.
    #[default]
    Week,
    /// The last 30 days.
    Month,
}

impl TimeWindow {
    /// Length of the window.
    pub const fn lookback(self) -> TimeDelta {
        match self {
            Self::Day => TimeDelta::days(1),
            Self::Week => TimeDelta::days(7),
            Self::Month => TimeDelta::days(30),
        }
    }

    /// Wire name of the window.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Parse `day`, `week`, or `month`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

/// The four analytics queries that make up a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum AnalyticsQuery {
    /// Top dishes by units sold.
    PopularDishes,
    /// Mean order-to-delivery minutes.
    DeliveryTime,
    /// Busiest ordering hours.
    PeakTimes,
    /// In-flight orders past the stale threshold.
    StaleOrders,
}

impl AnalyticsQuery {
    /// Every query, in snapshot section order.
    pub const ALL: [Self; 4] = [
        Self::PopularDishes,
        Self::DeliveryTime,
        Self::PeakTimes,
        Self::StaleOrders,
    ];

    /// Stable name used in logs and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PopularDishes => "popularDishes",
            Self::DeliveryTime => "deliveryTime",
            Self::PeakTimes => "peakTimes",
            Self::StaleOrders => "staleOrders",
        }
    }
}

impl core::fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Discriminant of a [`DomainEvent`](crate::events::DomainEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// `orderCreated`
    #[serde(rename = "orderCreated")]
    OrderCreated,
    /// `orderStatusUpdate`
    #[serde(rename = "orderStatusUpdate")]
    OrderStatusUpdated,
    /// `menuItemCreated`
    #[serde(rename = "menuItemCreated")]
    MenuItemCreated,
    /// `menuItemUpdated`
    #[serde(rename = "menuItemUpdated")]
    MenuItemUpdated,
    /// `menuItemDeleted`
    #[serde(rename = "menuItemDeleted")]
    MenuItemDeleted,
    /// `menuItemAvailabilityToggled`
    #[serde(rename = "menuItemAvailabilityToggled")]
    MenuItemAvailabilityToggled,
    /// `deliveryStatusUpdate`
    #[serde(rename = "deliveryStatusUpdate")]
    DeliveryStatusUpdated,
    /// `analyticsUpdate`
    #[serde(rename = "analyticsUpdate")]
    AnalyticsUpdated,
}

impl EventKind {
    /// Name of the event on the viewer wire protocol.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::OrderCreated => "orderCreated",
            Self::OrderStatusUpdated => "orderStatusUpdate",
            Self::MenuItemCreated => "menuItemCreated",
            Self::MenuItemUpdated => "menuItemUpdated",
            Self::MenuItemDeleted => "menuItemDeleted",
            Self::MenuItemAvailabilityToggled => "menuItemAvailabilityToggled",
            Self::DeliveryStatusUpdated => "deliveryStatusUpdate",
            Self::AnalyticsUpdated => "analyticsUpdate",
        }
    }

    /// Whether this kind reports a committed mutation in the collaborator
    /// store. Only the refresh pipeline produces `analyticsUpdate`.
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::AnalyticsUpdated)
    }

    /// Whether a mutation of this kind changes data the analytics read.
    ///
    /// Delivery records do not feed any aggregate, so delivery updates are
    /// forwarded without a recomputation.
    pub const fn triggers_refresh(self) -> bool {
        !matches!(self, Self::DeliveryStatusUpdated | Self::AnalyticsUpdated)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_statuses_match_predicate() {
        for status in OrderStatus::IN_FLIGHT {
            assert!(status.is_in_flight());
        }
        assert!(!OrderStatus::Delivered.is_in_flight());
        assert!(!OrderStatus::Cancelled.is_in_flight());
    }

    #[test]
    fn order_status_persisted_form_roundtrips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::ReadyForPickup,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).ok();
        assert_eq!(json.as_deref(), Some("\"OUT_FOR_DELIVERY\""));
    }

    #[test]
    fn time_window_defaults_to_week() {
        assert_eq!(TimeWindow::default(), TimeWindow::Week);
        assert_eq!(TimeWindow::Week.lookback(), TimeDelta::days(7));
        assert_eq!(TimeWindow::Month.lookback(), TimeDelta::days(30));
        assert_eq!(TimeWindow::parse("day"), Some(TimeWindow::Day));
        assert_eq!(TimeWindow::parse("year"), None);
    }

    #[test]
    fn event_kind_wire_names_match_serde() {
        let json = serde_json::to_string(&EventKind::OrderStatusUpdated).ok();
        assert_eq!(json.as_deref(), Some("\"orderStatusUpdate\""));
        assert_eq!(EventKind::AnalyticsUpdated.wire_name(), "analyticsUpdate");
    }

    #[test]
    fn delivery_updates_skip_refresh() {
        assert!(EventKind::DeliveryStatusUpdated.is_mutation());
        assert!(!EventKind::DeliveryStatusUpdated.triggers_refresh());
        assert!(EventKind::MenuItemDeleted.triggers_refresh());
        assert!(!EventKind::AnalyticsUpdated.is_mutation());
    }
}
