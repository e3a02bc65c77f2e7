//! In-process Entry Store.
//!
//! A sharded [`DashMap`] holds the entries; each key is guarded by its
//! shard lock and every write replaces a whole entry. Admission of new keys
//! goes through a small mutex so capacity is never exceeded.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, Category, EntryMeta, EntryStore, StatsCounters};
use crate::clock::Clock;
use crate::error::Result;
use crate::popularity::PopularityTracker;
use crate::registry::Pattern;

// == Memory Store ==
/// In-process cache storage with popularity-aware eviction and TTL support.
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: DashMap<String, CacheEntry>,
    /// Performance statistics
    stats: StatsCounters,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Serialises admission of new keys
    admission: Mutex<()>,
    /// Shared popularity source for eviction; falls back to entry hit counts
    popularity: Option<Arc<PopularityTracker>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new MemoryStore with the given capacity.
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            stats: StatsCounters::new(),
            max_entries: max_entries.max(1),
            admission: Mutex::new(()),
            popularity: None,
            clock,
        }
    }

    /// Ranks eviction candidates by the shared popularity tracker.
    pub fn with_popularity(mut self, popularity: Arc<PopularityTracker>) -> Self {
        self.popularity = Some(popularity);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    // == Insert ==
    fn insert(&self, entry: CacheEntry) {
        if self.entries.contains_key(&entry.key) {
            let key = entry.key.clone();
            self.entries.insert(key.clone(), entry);
            // The key may have been evicted between the check and the insert.
            if self.entries.len() > self.max_entries {
                let _admission = self.lock_admission();
                self.evict_until(self.max_entries, Some(&key));
            }
            return;
        }

        let _admission = self.lock_admission();
        if !self.entries.contains_key(&entry.key) {
            self.evict_until(self.max_entries - 1, None);
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    fn lock_admission(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.admission.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op = "admission", "Recovered from poisoned store lock");
                poisoned.into_inner()
            }
        }
    }

    // == Eviction ==
    /// Evicts entries until at most `target` remain, never touching `keep`.
    ///
    /// Victims: lowest popularity, then oldest access, then smallest key.
    fn evict_until(&self, target: usize, keep: Option<&str>) {
        while self.entries.len() > target {
            let victim = self
                .entries
                .iter()
                .filter(|entry| Some(entry.key().as_str()) != keep)
                .map(|entry| {
                    let popularity = match &self.popularity {
                        Some(tracker) => tracker.window_hits(entry.key()),
                        None => entry.hit_count,
                    };
                    (popularity, entry.last_accessed_at, entry.key().clone())
                })
                .min();

            let Some((popularity, _, key)) = victim else {
                return;
            };
            if self.entries.remove(&key).is_some() {
                self.stats.record_eviction();
                debug!(key = %key, popularity, "Evicted entry for capacity");
            }
        }
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    // == Get ==
    /// Expired entries are removed and counted as misses.
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now_ms();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.touch(now);
                self.stats.record_hit();
                return Ok(Some(entry.value.clone()));
            }
        }

        // Remove only if still expired: a concurrent refresh may have replaced it.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.stats.record_expired(1);
        }
        self.stats.record_miss();
        Ok(None)
    }

    async fn peek(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now_ms();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn metadata(&self, key: &str) -> Result<Option<EntryMeta>> {
        Ok(self.entries.get(key).map(|entry| entry.meta()))
    }

    // == Set ==
    async fn set(&self, key: &str, value: Value, ttl: Duration, category: Category) -> Result<()> {
        let entry = CacheEntry::new(key, value, ttl, category, self.clock.now_ms());
        self.insert(entry);
        Ok(())
    }

    // == Delete ==
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_matching(&self, pattern: &Pattern) -> Result<Vec<String>> {
        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| pattern.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed: Vec<String> = candidates
            .into_iter()
            .filter(|key| self.entries.remove(key).is_some())
            .collect();
        removed.sort();
        Ok(removed)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<usize> {
        let _admission = self.lock_admission();
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    // == Stats ==
    async fn stats(&self) -> Result<CacheStats> {
        Ok(self.stats.snapshot(self.entries.len(), self.max_entries))
    }

    // == Sweep Expired ==
    async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            removed += usize::from(expired);
            !expired
        });
        self.stats.record_expired(removed as u64);
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
