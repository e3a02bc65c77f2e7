//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Category ==
/// TTL class of an entry.
///
/// Category only selects the TTL; it never changes eviction order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Data that may still be updated (current month, live counts)
    #[default]
    Standard,
    /// Data that cannot change (past months)
    Historical,
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), always after `created_at`
    pub expires_at: u64,
    /// Last read timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of reads served from this entry
    pub hit_count: u64,
    /// TTL class
    pub category: Category,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` after `now_ms`.
    ///
    /// A zero TTL is clamped to one millisecond so `expires_at > created_at`.
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration, category: Category, now_ms: u64) -> Self {
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        Self {
            key: key.into(),
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms),
            last_accessed_at: now_ms,
            hit_count: 0,
            category,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time reaches
    /// the expiration time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// True when the entry expires within `window` of `now_ms` (or already has).
    pub fn expires_within(&self, window: Duration, now_ms: u64) -> bool {
        self.expires_at <= now_ms.saturating_add(window.as_millis() as u64)
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self, now_ms: u64) {
        self.hit_count += 1;
        self.last_accessed_at = now_ms;
    }

    /// Returns remaining TTL in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }

    /// Metadata view without the value.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            hit_count: self.hit_count,
            category: self.category,
        }
    }
}

// == Entry Metadata ==
/// Entry metadata, as returned by non-mutating peeks and over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub last_accessed_at: u64,
    pub hit_count: u64,
    pub category: Category,
}

impl EntryMeta {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    pub fn expires_within(&self, window: Duration, now_ms: u64) -> bool {
        self.expires_at <= now_ms.saturating_add(window.as_millis() as u64)
    }
}
