//! Domain events pushed to restaurant channels.
//!
//! A [`DomainEvent`] pairs the restaurant whose channel it belongs to with
//! a kind-specific [`EventPayload`]. Events are immutable once built: the
//! fields are private and only readable through accessors, so an event
//! shared between many sessions behind an `Arc` is never observed in two
//! different states.
//!
//! On the wire an event is a single JSON object:
//!
//! ```text
//! { "restaurantId": 5, "event": "orderCreated", "data": { ...order... } }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EventKind;
use crate::ids::{MenuItemId, RestaurantId};
use crate::structs::{AnalyticsSnapshot, DeletedMenuItem, Delivery, MenuItem, Order};

/// Kind-specific event body, tagged with the wire event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum EventPayload {
    /// A new order was placed.
    #[serde(rename = "orderCreated")]
    OrderCreated(Order),
    /// An order moved to a new status.
    #[serde(rename = "orderStatusUpdate")]
    OrderStatusUpdated(Order),
    /// A menu item was added.
    #[serde(rename = "menuItemCreated")]
    MenuItemCreated(MenuItem),
    /// A menu item was edited.
    #[serde(rename = "menuItemUpdated")]
    MenuItemUpdated(MenuItem),
    /// A menu item was removed.
    #[serde(rename = "menuItemDeleted")]
    MenuItemDeleted(DeletedMenuItem),
    /// A menu item was switched on or off.
    #[serde(rename = "menuItemAvailabilityToggled")]
    MenuItemAvailabilityToggled(MenuItem),
    /// A delivery changed status.
    #[serde(rename = "deliveryStatusUpdate")]
    DeliveryStatusUpdated(Delivery),
    /// A freshly recomputed analytics snapshot.
    #[serde(rename = "analyticsUpdate")]
    AnalyticsUpdated(Box<AnalyticsSnapshot>),
}

impl EventPayload {
    /// The discriminant of this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::OrderCreated(_) => EventKind::OrderCreated,
            Self::OrderStatusUpdated(_) => EventKind::OrderStatusUpdated,
            Self::MenuItemCreated(_) => EventKind::MenuItemCreated,
            Self::MenuItemUpdated(_) => EventKind::MenuItemUpdated,
            Self::MenuItemDeleted(_) => EventKind::MenuItemDeleted,
            Self::MenuItemAvailabilityToggled(_) => EventKind::MenuItemAvailabilityToggled,
            Self::DeliveryStatusUpdated(_) => EventKind::DeliveryStatusUpdated,
            Self::AnalyticsUpdated(_) => EventKind::AnalyticsUpdated,
        }
    }

    /// The restaurant named inside the payload record, when it names one.
    ///
    /// `menuItemDeleted` carries only the deleted id.
    pub const fn record_restaurant(&self) -> Option<RestaurantId> {
        match self {
            Self::OrderCreated(order) | Self::OrderStatusUpdated(order) => {
                Some(order.restaurant_id)
            }
            Self::MenuItemCreated(item)
            | Self::MenuItemUpdated(item)
            | Self::MenuItemAvailabilityToggled(item) => Some(item.restaurant_id),
            Self::DeliveryStatusUpdated(delivery) => Some(delivery.restaurant_id),
            Self::AnalyticsUpdated(snapshot) => Some(snapshot.restaurant_id),
            Self::MenuItemDeleted(_) => None,
        }
    }
}

/// An immutable event addressed to one restaurant channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    restaurant_id: RestaurantId,
    #[serde(flatten)]
    payload: EventPayload,
}

impl DomainEvent {
    /// Build an event for an explicit restaurant.
    pub const fn new(restaurant_id: RestaurantId, payload: EventPayload) -> Self {
        Self {
            restaurant_id,
            payload,
        }
    }

    /// `orderCreated` for the order's restaurant.
    pub const fn order_created(order: Order) -> Self {
        Self::new(order.restaurant_id, EventPayload::OrderCreated(order))
    }

    /// `orderStatusUpdate` for the order's restaurant.
    pub const fn order_status_updated(order: Order) -> Self {
        Self::new(order.restaurant_id, EventPayload::OrderStatusUpdated(order))
    }

    /// `menuItemCreated` for the item's restaurant.
    pub const fn menu_item_created(item: MenuItem) -> Self {
        Self::new(item.restaurant_id, EventPayload::MenuItemCreated(item))
    }

    /// `menuItemUpdated` for the item's restaurant.
    pub const fn menu_item_updated(item: MenuItem) -> Self {
        Self::new(item.restaurant_id, EventPayload::MenuItemUpdated(item))
    }

    /// `menuItemDeleted`; the deleted row no longer names its restaurant.
    pub const fn menu_item_deleted(restaurant_id: RestaurantId, id: MenuItemId) -> Self {
        Self::new(
            restaurant_id,
            EventPayload::MenuItemDeleted(DeletedMenuItem { id }),
        )
    }

    /// `menuItemAvailabilityToggled` for the item's restaurant.
    pub const fn menu_item_availability_toggled(item: MenuItem) -> Self {
        Self::new(
            item.restaurant_id,
            EventPayload::MenuItemAvailabilityToggled(item),
        )
    }

    /// `deliveryStatusUpdate` for the delivery's restaurant.
    pub const fn delivery_status_updated(delivery: Delivery) -> Self {
        Self::new(
            delivery.restaurant_id,
            EventPayload::DeliveryStatusUpdated(delivery),
        )
    }

    /// `analyticsUpdate` for the snapshot's restaurant.
    pub fn analytics_updated(snapshot: AnalyticsSnapshot) -> Self {
        Self::new(
            snapshot.restaurant_id,
            EventPayload::AnalyticsUpdated(Box::new(snapshot)),
        )
    }

    /// Restaurant channel this event is addressed to.
    pub const fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    /// Kind-specific body.
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// The discriminant of the payload.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Whether the channel id agrees with the restaurant named in the
    /// payload record. Events decoded from untrusted input must pass this
    /// before being broadcast.
    pub fn is_consistent(&self) -> bool {
        self.restaurant_id.is_valid()
            && self
                .payload
                .record_restaurant()
                .is_none_or(|inner| inner == self.restaurant_id)
    }
}
