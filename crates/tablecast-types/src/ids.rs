//! Type-safe identifier wrappers.
//!
//! Restaurants, menu items, orders, and deliveries are keyed by the
//! integer primary keys the collaborator store assigns (`BIGSERIAL`).
//! Viewer sessions are keyed by an opaque UUID v7 minted on connect.
//! Wrapping each in its own newtype prevents mixing a menu item id with
//! an order id at compile time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an `i64` store key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw store key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the inner key.
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Store keys start at 1; zero and negatives never name a row.
            pub const fn is_valid(self) -> bool {
                self.0 >= 1
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key! {
    /// Identifier of a restaurant; also names the restaurant's event channel.
    RestaurantId
}

define_key! {
    /// Identifier of a menu item.
    MenuItemId
}

define_key! {
    /// Identifier of an order.
    OrderId
}

define_key! {
    /// Identifier of a line item within an order.
    OrderItemId
}

define_key! {
    /// Identifier of a delivery record.
    DeliveryId
}

define_key! {
    /// Identifier of the customer who placed an order.
    UserId
}

/// Opaque identifier for one live viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Mint a new session identifier (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
