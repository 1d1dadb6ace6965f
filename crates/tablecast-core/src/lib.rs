//! Restaurant-scoped broadcast and analytics refresh for Tablecast.
//!
//! Viewers subscribe to restaurant channels; committed mutations are pushed
//! to those channels as they happen and followed by a freshly recomputed
//! analytics snapshot.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `tablecast-config.yaml` into
//!   strongly-typed structs.
//! - [`store`] -- The [`AnalyticsStore`] seam to the collaborator store.
//! - [`memory`] -- [`MemoryStore`], an in-process [`AnalyticsStore`].
//! - [`registry`] -- [`SubscriptionRegistry`], the channel/session maps.
//! - [`session`] -- [`ConnectionSession`], one live viewer connection.
//! - [`broadcast`] -- [`Broadcaster`], per-channel fan-out.
//! - [`aggregator`] -- [`Aggregator`], the four analytics queries.
//! - [`pipeline`] -- [`RefreshPipeline`], mutation to snapshot orchestration.

pub mod aggregator;
pub mod broadcast;
pub mod config;
pub mod memory;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod store;

pub use aggregator::{AggregationFailed, Aggregator, AggregatorSettings, SnapshotSections};
pub use broadcast::{Broadcaster, DeliveryFailed, DeliveryFailure, EmitReport};
pub use config::{ConfigError, StoreBackend, TablecastConfig};
pub use memory::MemoryStore;
pub use pipeline::{
    MutationOutcome, PersistenceFailed, RefreshError, RefreshOutcome, RefreshPipeline, RefreshTask,
};
pub use registry::{RegistryError, RegistryStats, SubscriptionRegistry};
pub use session::{AckStatus, ConnectionSession, SubscriptionAck};
pub use store::{AnalyticsStore, StoreError};
