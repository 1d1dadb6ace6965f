//! Shared application state for the gateway.
//!
//! [`AppState`] holds the refresh pipeline (and through it the registry,
//! broadcaster, and aggregator) plus the per-session queue depth used
//! when a viewer connects. In memory mode it also holds the store that
//! posted mutations are written to.

use std::sync::Arc;

use tablecast_core::{
    Aggregator, AggregatorSettings, AnalyticsStore, Broadcaster, MemoryStore, RefreshPipeline,
    SubscriptionRegistry, TablecastConfig,
};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Mutation intake, recomputation, and broadcast.
    pub pipeline: Arc<RefreshPipeline>,
    /// Outbound queue depth for each viewer session.
    pub session_buffer: usize,
    /// Store that posted mutations are applied to before the refresh.
    /// `None` when another system owns the data.
    pub mirror: Option<Arc<MemoryStore>>,
}

impl AppState {
    /// Create state around an assembled pipeline.
    pub const fn new(pipeline: Arc<RefreshPipeline>, session_buffer: usize) -> Self {
        Self {
            pipeline,
            session_buffer,
            mirror: None,
        }
    }

    /// Wire a registry, broadcaster, aggregator, and pipeline over `store`
    /// using the analytics and broadcast sections of `config`.
    pub fn from_config(store: Arc<dyn AnalyticsStore>, config: &TablecastConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let aggregator = Aggregator::new(store, AggregatorSettings::from(&config.analytics));
        let pipeline = RefreshPipeline::new(aggregator, Broadcaster::new(registry));
        Self::new(Arc::new(pipeline), config.broadcast.session_buffer)
    }

    /// Wire the pipeline over an in-process store that also records every
    /// posted mutation.
    pub fn in_memory(store: Arc<MemoryStore>, config: &TablecastConfig) -> Self {
        let mut state = Self::from_config(store.clone(), config);
        state.mirror = Some(store);
        state
    }

    /// The subscription registry viewers are attached to.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.pipeline.registry()
    }

    /// The analytics aggregator.
    pub fn aggregator(&self) -> &Aggregator {
        self.pipeline.aggregator()
    }
}
