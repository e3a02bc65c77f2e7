//! Popularity Tracker Module
//!
//! Counts accesses per key over a rolling window. Each time the window
//! elapses every count is halved and keys that reach zero are dropped, so
//! popularity follows recent demand rather than all-time totals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::Clock;

// == Popularity Record ==
/// Access count of one key in the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularityRecord {
    pub key: String,
    pub window_hits: u64,
    /// Last access (Unix milliseconds)
    pub last_seen: u64,
    /// Global access sequence number, breaks ties within one millisecond
    pub(crate) last_seq: u64,
}

// == Popularity Tracker ==
#[derive(Debug)]
pub struct PopularityTracker {
    records: DashMap<String, PopularityRecord>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    window_started_at: AtomicU64,
    seq: AtomicU64,
}

impl PopularityTracker {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            records: DashMap::new(),
            clock,
            window_ms: (window.as_millis() as u64).max(1),
            window_started_at: AtomicU64::new(now),
            seq: AtomicU64::new(0),
        }
    }

    // == Record Access ==
    pub fn record_access(&self, key: &str) {
        let now = self.rotate_if_due();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| PopularityRecord {
                key: key.to_string(),
                window_hits: 0,
                last_seen: now,
                last_seq: seq,
            });
        record.window_hits += 1;
        record.last_seen = now;
        record.last_seq = seq;
    }

    // == Top Popular ==
    /// Up to `n` keys, most accessed first; ties go to the most recent access.
    pub fn top_popular(&self, n: usize) -> Vec<String> {
        self.rotate_if_due();
        let mut records: Vec<PopularityRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| {
            b.window_hits
                .cmp(&a.window_hits)
                .then(b.last_seen.cmp(&a.last_seen))
                .then(b.last_seq.cmp(&a.last_seq))
        });
        records.into_iter().take(n).map(|record| record.key).collect()
    }

    /// True when the key has at least `threshold` hits this window.
    pub fn is_popular(&self, key: &str, threshold: u64) -> bool {
        self.window_hits(key) >= threshold.max(1)
    }

    pub fn window_hits(&self, key: &str) -> u64 {
        self.rotate_if_due();
        self.records
            .get(key)
            .map(|record| record.window_hits)
            .unwrap_or(0)
    }

    /// Drops the record for a key.
    pub fn forget(&self, key: &str) {
        self.records.remove(key);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // == Window Rotation ==
    /// Decays counts once per elapsed window. Returns the current time.
    fn rotate_if_due(&self) -> u64 {
        let now = self.clock.now_ms();
        let started = self.window_started_at.load(Ordering::Acquire);
        let elapsed = now.saturating_sub(started);
        if elapsed < self.window_ms {
            return now;
        }
        let windows = elapsed / self.window_ms;
        let next_start = started + windows * self.window_ms;
        // Only the caller that moves the window start performs the decay.
        if self
            .window_started_at
            .compare_exchange(started, next_start, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let shift = windows.min(63) as u32;
            self.records.retain(|_, record| {
                record.window_hits >>= shift;
                record.window_hits > 0
            });
            debug!(windows, remaining = self.records.len(), "Popularity window rotated");
        }
        now
    }
}
