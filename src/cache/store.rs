//! Entry Store interface.
//!
//! Every backend (in-process or remote) is used through [`EntryStore`].
//! Backends report connectivity problems as
//! [`CacheError::BackendUnavailable`](crate::error::CacheError); the engine
//! decides to degrade those into misses.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheStats, Category, EntryMeta};
use crate::error::Result;
use crate::registry::Pattern;

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Reads a live value, updating access metadata and hit/miss counters.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Reads a live value without side effects.
    async fn peek(&self, key: &str) -> Result<Option<Value>>;

    /// Entry metadata without side effects. Expired entries are still
    /// returned until removed.
    async fn metadata(&self, key: &str) -> Result<Option<EntryMeta>>;

    /// Stores a value, replacing any previous entry as a whole.
    async fn set(&self, key: &str, value: Value, ttl: Duration, category: Category) -> Result<()>;

    /// Removes a key. Returns whether it was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every key matched by `pattern`; returns the removed keys, sorted.
    async fn delete_matching(&self, pattern: &Pattern) -> Result<Vec<String>>;

    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Removes everything. Returns how many entries were removed.
    async fn clear(&self) -> Result<usize>;

    async fn size(&self) -> Result<usize>;

    async fn stats(&self) -> Result<CacheStats>;

    /// Eagerly removes expired entries.
    async fn sweep_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
