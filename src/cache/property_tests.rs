//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify store behaviour over generated operation sequences.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::{json, Value};
use tokio_test::block_on;

use crate::cache::{Category, EntryStore, MemoryStore};
use crate::clock::ManualClock;
use crate::registry::{match_keys, Pattern};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates keys shaped like the route layer's query fingerprints
fn key_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("crimes"), Just("stats"), Just("map")],
        2019u32..2025,
        1u32..13,
        "[a-z]{0,6}",
    )
        .prop_map(|(prefix, year, month, suffix)| format!("{prefix}:{year}-{month:02}:{suffix}"))
}

fn value_strategy() -> impl Strategy<Value = Value> {
    (0u64..10_000, "[a-zA-Z ]{0,16}").prop_map(|(count, label)| json!({ "count": count, "label": label }))
}

/// Patterns in both matching modes
fn pattern_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (2019u32..2025, 1u32..13).prop_map(|(year, month)| format!("{year}-{month:02}")),
        Just("^stats:".to_string()),
        (2019u32..2025).prop_map(|year| format!("crimes:.*{year}.*")),
        Just("map:".to_string()),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn new_store(max_entries: usize) -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    (MemoryStore::new(max_entries, clock.clone()), clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hit and miss counters match the outcome of every read.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (store, _) = new_store(TEST_MAX_ENTRIES);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        block_on(async {
            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        store.set(&key, value, TEST_TTL, Category::Standard).await.unwrap();
                    }
                    CacheOp::Get { key } => match store.get(&key).await.unwrap() {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    },
                    CacheOp::Delete { key } => {
                        store.delete(&key).await.unwrap();
                    }
                }
            }
        });

        let stats = block_on(store.stats()).unwrap();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.entries, store.len(), "Entry count mismatch");
    }

    // A value read before its TTL elapses is the value last written.
    #[test]
    fn prop_roundtrip_until_expiry(
        key in key_strategy(),
        value in value_strategy(),
        ttl_ms in 2u64..10_000,
    ) {
        let (store, clock) = new_store(TEST_MAX_ENTRIES);
        let ttl = Duration::from_millis(ttl_ms);

        block_on(store.set(&key, value.clone(), ttl, Category::Standard)).unwrap();

        clock.advance(ttl - Duration::from_millis(1));
        prop_assert_eq!(block_on(store.get(&key)).unwrap(), Some(value));

        clock.advance(Duration::from_millis(2));
        prop_assert_eq!(block_on(store.get(&key)).unwrap(), None);
    }

    // deleteMatching removes exactly the matched keys.
    #[test]
    fn prop_delete_matching_removes_exactly_matches(
        keys in prop::collection::vec(key_strategy(), 0..40),
        source in pattern_strategy(),
    ) {
        let (store, _) = new_store(TEST_MAX_ENTRIES);
        let pattern = Pattern::compile(&source).unwrap();

        block_on(async {
            for key in &keys {
                store.set(key, json!(null), TEST_TTL, Category::Standard).await.unwrap();
            }
        });

        let live = block_on(store.list_keys()).unwrap();
        let size_before = live.len();
        let mut expected = match_keys(&pattern, &live);
        expected.sort();

        let removed = block_on(store.delete_matching(&pattern)).unwrap();
        let size_after = block_on(store.size()).unwrap();

        prop_assert_eq!(&removed, &expected);
        prop_assert_eq!(size_after, size_before - expected.len());

        let remaining = block_on(store.list_keys()).unwrap();
        prop_assert!(remaining.iter().all(|key| !pattern.is_match(key)));
    }

    // The store never holds more than its capacity.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let (store, _) = new_store(max_entries);

        for (key, value) in entries {
            block_on(store.set(&key, value, TEST_TTL, Category::Standard)).unwrap();
            prop_assert!(
                store.len() <= max_entries,
                "Cache size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // Filling past capacity evicts the least-read entry and keeps the new one.
    #[test]
    fn prop_eviction_spares_read_entries(
        keys in prop::collection::vec(key_strategy(), 3..10),
        new_key in key_strategy(),
    ) {
        let unique_keys: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let (store, clock) = new_store(capacity);
        let cold_key = unique_keys[0].clone();

        block_on(async {
            for key in &unique_keys {
                store.set(key, json!(key), TEST_TTL, Category::Standard).await.unwrap();
                clock.advance(Duration::from_millis(1));
            }
            for key in unique_keys.iter().skip(1) {
                store.get(key).await.unwrap();
            }
            store.set(&new_key, json!("new"), TEST_TTL, Category::Standard).await.unwrap();
        });

        prop_assert_eq!(store.len(), capacity);
        prop_assert_eq!(block_on(store.peek(&cold_key)).unwrap(), None);
        prop_assert!(block_on(store.peek(&new_key)).unwrap().is_some());
        for key in unique_keys.iter().skip(1) {
            prop_assert!(block_on(store.peek(key)).unwrap().is_some(), "Key '{}' should survive", key);
        }
    }
}
