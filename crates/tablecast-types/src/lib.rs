//! Shared type definitions for Tablecast.
//!
//! This crate is the single source of truth for the records, analytics
//! projections, and events that flow between the collaborator store, the
//! refresh pipeline, and connected viewers. Types flow downstream to
//! `TypeScript` via `ts-rs` for the restaurant dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Typed store keys and the viewer session id
//! - [`enums`] -- Order/delivery statuses, time windows, query and event kinds
//! - [`structs`] -- Domain records and analytics projections
//! - [`events`] -- The immutable [`DomainEvent`] pushed to restaurant channels

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AnalyticsQuery, DeliveryStatus, EventKind, OrderStatus, TimeWindow};
pub use events::{DomainEvent, EventPayload};
pub use ids::{DeliveryId, MenuItemId, OrderId, OrderItemId, RestaurantId, SessionId, UserId};
pub use structs::{
    AnalyticsSnapshot, AnalyticsSummary, DeletedMenuItem, Delivery, DeliveryTimeStats, HourCount,
    MenuItem, Order, OrderItem, PeakHour, PopularDish, StaleOrder,
};
