//! Invalidation Service
//!
//! Orchestrates the Entry Store, the Key Registry and the Popularity
//! Tracker. Batch operations never stop at the first failure: every
//! pattern or key is attempted and problems are collected in the returned
//! [`InvalidationReport`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::event::{DataChangeEvent, Operation};
use super::report::InvalidationReport;
use super::strategy::PatternStrategy;
use crate::cache::{Category, EntryStore};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::popularity::PopularityTracker;
use crate::registry::{KeyRegistry, Pattern};

/// Item reported by a successful full clear.
pub const ALL_KEYS: &str = "all";

pub struct InvalidationService {
    store: Arc<dyn EntryStore>,
    registry: Arc<KeyRegistry>,
    popularity: Arc<PopularityTracker>,
    strategy: Arc<dyn PatternStrategy>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl InvalidationService {
    pub fn new(
        store: Arc<dyn EntryStore>,
        registry: Arc<KeyRegistry>,
        popularity: Arc<PopularityTracker>,
        strategy: Arc<dyn PatternStrategy>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            store,
            registry,
            popularity,
            strategy,
            clock,
            config,
        }
    }

    // == Pattern Invalidation ==
    /// Removes every key matched by each pattern, in input order.
    pub async fn invalidate_by_pattern(&self, patterns: &[String]) -> InvalidationReport {
        let report = self.delete_patterns(patterns).await;
        for key in &report.invalidated {
            self.popularity.forget(key);
        }
        info!(
            patterns = patterns.len(),
            invalidated = report.invalidated.len(),
            errors = report.errors.len(),
            "Pattern invalidation complete"
        );
        report
    }

    async fn delete_patterns(&self, patterns: &[String]) -> InvalidationReport {
        let mut report = InvalidationReport::new();
        let mut seen = HashSet::new();

        for source in patterns {
            let pattern = match Pattern::compile(source) {
                Ok(pattern) => pattern,
                Err(err) => {
                    warn!(pattern = %source, error = %err, "Skipping invalid pattern");
                    report.push_error(source.as_str(), err);
                    continue;
                }
            };

            match self.store.delete_matching(&pattern).await {
                Ok(keys) => {
                    debug!(pattern = %pattern, removed = keys.len(), "Pattern applied");
                    report
                        .invalidated
                        .extend(keys.into_iter().filter(|key| seen.insert(key.clone())));
                }
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "Pattern invalidation failed");
                    report.push_error(source.as_str(), err);
                }
            }
        }
        report
    }

    // == Full Clear ==
    pub async fn invalidate_all(&self) -> InvalidationReport {
        let mut report = InvalidationReport::new();
        match self.store.clear().await {
            Ok(count) => {
                info!(removed = count, "Cache cleared");
                report.invalidated.push(ALL_KEYS.to_string());
            }
            Err(err) => {
                warn!(error = %err, "Cache clear failed");
                report.push_error(ALL_KEYS, err);
            }
        }
        report
    }

    // == Data Change ==
    /// Invalidates what an upstream change may have made stale.
    ///
    /// For inserts and updates the most popular of the removed keys are
    /// recomputed straight away so hot queries don't all miss at once.
    pub async fn invalidate_by_data_change(&self, event: &DataChangeEvent) -> InvalidationReport {
        let patterns = self.strategy.derive_patterns(event);
        debug!(
            collection = %event.collection,
            operation = ?event.operation,
            patterns = ?patterns,
            "Derived invalidation patterns"
        );

        let mut report = self.delete_patterns(&patterns).await;

        let hot = if event.operation == Operation::Delete {
            Vec::new()
        } else {
            self.hottest(&report.invalidated, self.config.change_refresh_limit)
        };

        for key in report.invalidated.iter().filter(|key| !hot.contains(key)) {
            self.popularity.forget(key);
        }
        for key in hot {
            match self.refresh_key(&key, None).await {
                Ok(_) => report.refreshed.push(key),
                Err(err) => {
                    warn!(key = %key, error = %err, "Post-change refresh failed");
                    report.push_error(key, err);
                }
            }
        }

        info!(
            collection = %event.collection,
            operation = ?event.operation,
            invalidated = report.invalidated.len(),
            refreshed = report.refreshed.len(),
            errors = report.errors.len(),
            "Data change processed"
        );
        report
    }

    /// Up to `limit` of `keys` with window hits, most popular first.
    fn hottest(&self, keys: &[String], limit: usize) -> Vec<String> {
        let mut ranked: Vec<(u64, &String)> = keys
            .iter()
            .map(|key| (self.popularity.window_hits(key), key))
            .filter(|(hits, _)| *hits > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().take(limit).map(|(_, key)| key.clone()).collect()
    }

    // == Background Refresh ==
    /// Recomputes popular entries that expire within the refresh window.
    ///
    /// Every key meeting the popularity threshold is considered, most
    /// popular first. The batch cap applies to entries that are present and
    /// due, so popular keys that are gone or far from expiry never crowd out
    /// one that is about to lapse.
    pub async fn background_refresh(&self) -> InvalidationReport {
        let mut report = InvalidationReport::new();
        let now = self.clock.now_ms();
        let threshold = self.config.popularity_threshold;
        let ranked = self.popularity.top_popular(self.popularity.len());

        let mut due = Vec::new();
        for key in ranked {
            if due.len() >= self.config.refresh_batch {
                break;
            }
            if !self.popularity.is_popular(&key, threshold) {
                break;
            }
            match self.store.metadata(&key).await {
                Ok(Some(meta)) if meta.expires_within(self.config.refresh_window, now) => {
                    due.push((key, meta.category));
                }
                Ok(_) => {}
                Err(err) => report.push_error(key, err),
            }
        }

        for (key, category) in due {
            match self.refresh_key(&key, Some(category)).await {
                Ok(_) => report.refreshed.push(key),
                Err(err) => {
                    warn!(key = %key, error = %err, "Background refresh failed");
                    report.push_error(key, err);
                }
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            errors = report.errors.len(),
            "Background refresh complete"
        );
        report
    }

    // == Warming ==
    /// Recomputes every key in `keys` whatever its current state.
    pub async fn warm(&self, keys: &[String]) -> InvalidationReport {
        let mut report = InvalidationReport::new();
        for key in keys {
            match self.refresh_key(key, None).await {
                Ok(_) => report.refreshed.push(key.clone()),
                Err(err) => {
                    warn!(key = %key, error = %err, "Warming failed");
                    report.push_error(key.as_str(), err);
                }
            }
        }
        info!(
            warmed = report.refreshed.len(),
            errors = report.errors.len(),
            "Warming complete"
        );
        report
    }

    // == Refresh Key ==
    /// Recomputes one key and stores the result.
    ///
    /// The store is written only once the recompute succeeded. `category`
    /// overrides the recompute's own hint, e.g. to keep a stored category.
    pub async fn refresh_key(&self, key: &str, category: Option<Category>) -> Result<Value> {
        let (value, hinted) = self.recompute(key).await?;
        let category = category.unwrap_or(hinted);
        self.store
            .set(key, value.clone(), self.config.ttl_for(category), category)
            .await?;
        debug!(key = %key, category = ?category, "Refreshed entry");
        Ok(value)
    }

    /// Runs the registered recompute for `key` without storing the result.
    pub async fn recompute(&self, key: &str) -> Result<(Value, Category)> {
        let recompute = self
            .registry
            .find_recompute(key)
            .ok_or_else(|| CacheError::NoRecompute(key.to_string()))?;

        let value = recompute
            .recompute(key)
            .await
            .map_err(|err| CacheError::RecomputeFailed {
                key: key.to_string(),
                message: format!("{err:#}"),
            })?;
        Ok((value, recompute.category(key)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
