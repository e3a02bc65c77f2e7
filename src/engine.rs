//! Cache Engine
//!
//! Wires the Entry Store, Key Registry, Popularity Tracker, Invalidation
//! Service and Scheduler together and owns the read path.
//!
//! # Read path
//! [`CacheEngine::get_or_compute`] records the access, reads the store and
//! on a miss runs the registered recompute. Concurrent misses for one key
//! share a single recompute and all receive its result, including a
//! failure. Store failures on this path degrade to a miss and are logged,
//! never returned.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, Category, EntryStore, MemoryStore, RemoteStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::invalidation::{
    CrimeDataStrategy, DataChangeEvent, InvalidationReport, InvalidationService, PatternStrategy,
};
use crate::popularity::PopularityTracker;
use crate::registry::{KeyRegistry, Recompute};
use crate::tasks::Scheduler;

// == Builder ==
/// Builds a [`CacheEngine`], with defaults for anything not set.
pub struct CacheEngineBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn EntryStore>>,
    strategy: Option<Arc<dyn PatternStrategy>>,
}

impl CacheEngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Uses `store` instead of the backend chosen from the configuration.
    pub fn store(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn PatternStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Fails only when the configured remote store URL is unusable.
    pub fn build(self) -> Result<CacheEngine> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let popularity = Arc::new(PopularityTracker::new(
            config.popularity_window,
            Arc::clone(&clock),
        ));

        let store: Arc<dyn EntryStore> = match (self.store, &config.remote_store_url) {
            (Some(store), _) => store,
            (None, Some(url)) => Arc::new(RemoteStore::new(url, config.backend_timeout)?),
            (None, None) => Arc::new(
                MemoryStore::new(config.max_entries, Arc::clone(&clock))
                    .with_popularity(Arc::clone(&popularity)),
            ),
        };
        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(CrimeDataStrategy));
        let registry = Arc::new(KeyRegistry::new());

        let service = Arc::new(InvalidationService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&popularity),
            strategy,
            clock,
            config.clone(),
        ));
        let scheduler = Scheduler::new(Arc::clone(&service), Arc::clone(&store));

        info!(
            backend = store.backend_name(),
            max_entries = config.max_entries,
            default_ttl_secs = config.default_ttl.as_secs(),
            "Cache engine initialized"
        );

        Ok(CacheEngine {
            config,
            store,
            registry,
            popularity,
            service,
            scheduler,
            pending: DashMap::new(),
        })
    }
}

// == Cache Engine ==
pub struct CacheEngine {
    config: Config,
    store: Arc<dyn EntryStore>,
    registry: Arc<KeyRegistry>,
    popularity: Arc<PopularityTracker>,
    service: Arc<InvalidationService>,
    scheduler: Scheduler,
    /// Recomputes in progress, one per key. Every caller that joins a
    /// flight gets the leader's result, success or failure.
    pending: DashMap<String, Arc<OnceCell<Result<Value>>>>,
}

impl CacheEngine {
    /// Builds an engine with the system clock and the configured backend.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> CacheEngineBuilder {
        CacheEngineBuilder {
            config,
            clock: None,
            store: None,
            strategy: None,
        }
    }

    // == Read Path ==
    /// Cached value for `key`, or `None` on a miss or a store failure.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.popularity.record_access(key);
        self.read(key).await
    }

    /// Cached value for `key`, recomputing and storing it on a miss.
    pub async fn get_or_compute(&self, key: &str) -> Result<Value> {
        self.popularity.record_access(key);
        if let Some(value) = self.read(key).await {
            return Ok(value);
        }

        let flight = self
            .pending
            .entry(key.to_string())
            .or_default()
            .clone();
        let result = flight
            .get_or_init(|| async {
                match self.peek(key).await {
                    Some(value) => {
                        debug!(key = %key, "Served by an earlier recompute");
                        Ok(value)
                    }
                    None => self.compute_and_store(key).await,
                }
            })
            .await
            .clone();

        // The first caller back retires the flight so a later miss, or a
        // retry after a failure, starts a new one.
        self.pending
            .remove_if(key, |_, current| Arc::ptr_eq(current, &flight));
        result
    }

    async fn compute_and_store(&self, key: &str) -> Result<Value> {
        let (value, category) = self.service.recompute(key).await?;
        self.set(key, value.clone(), category).await;
        Ok(value)
    }

    async fn read(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn peek(&self, key: &str) -> Option<Value> {
        match self.store.peek(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "Cache peek failed, treating as miss");
                None
            }
        }
    }

    /// Stores a value with the TTL of its category. Failures are logged.
    pub async fn set(&self, key: &str, value: Value, category: Category) {
        let ttl = self.config.ttl_for(category);
        if let Err(err) = self.store.set(key, value, ttl, category).await {
            warn!(key = %key, error = %err, "Cache write failed");
        }
    }

    /// Registers the recompute function for a key or key pattern.
    pub fn register<R>(&self, pattern_or_key: &str, recompute: R) -> Result<()>
    where
        R: Recompute + 'static,
    {
        self.registry.register(pattern_or_key, recompute)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }

    // == Administration ==
    pub async fn invalidate_by_pattern(&self, patterns: &[String]) -> InvalidationReport {
        self.service.invalidate_by_pattern(patterns).await
    }

    pub async fn invalidate_all(&self) -> InvalidationReport {
        self.service.invalidate_all().await
    }

    pub async fn invalidate_by_data_change(&self, event: &DataChangeEvent) -> InvalidationReport {
        self.service.invalidate_by_data_change(event).await
    }

    /// Runs a refresh cycle now; `None` if one is already running.
    pub async fn background_refresh(&self) -> Option<InvalidationReport> {
        self.scheduler.run_refresh_now().await
    }

    /// Warms the configured keys now; `None` if warming is already running.
    pub async fn warm_popular_data(&self) -> Option<InvalidationReport> {
        self.scheduler.run_warming_now().await
    }

    // == Lifecycle ==
    /// Starts the background tasks. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub fn store(&self) -> Arc<dyn EntryStore> {
        Arc::clone(&self.store)
    }

    pub fn popularity(&self) -> &PopularityTracker {
        &self.popularity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}
