//! Integration Tests for the Remote Store Backend
//!
//! Starts a real cache node on a local port and drives it through
//! `RemoteStore`, the client side of the `/store` protocol.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crime_cache::cache::{EntryStore, RemoteStore};
use crime_cache::registry::Pattern;
use crime_cache::{create_router, AppState, CacheEngine, CacheError, Category, Config};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

/// Serves a fresh in-memory node and returns its base URL.
async fn spawn_node() -> String {
    let engine = Arc::new(CacheEngine::new(Config::default()).unwrap());
    let app = create_router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Serves a `/store` node that answers every read long after any client
/// timeout used here.
async fn spawn_stalled_node() -> String {
    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(10)).await;
        "{}"
    }

    let app = axum::Router::new().route("/store/entries/:key", axum::routing::get(stall));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> RemoteStore {
    RemoteStore::new(base_url, Duration::from_secs(2)).unwrap()
}

const TTL: Duration = Duration::from_secs(60);

// == Protocol Tests ==

#[tokio::test]
async fn test_set_get_and_peek() {
    let store = client(&spawn_node().await);

    assert_ok!(
        store
            .set("stats:2024-01", json!({ "count": 3 }), TTL, Category::Standard)
            .await
    );
    assert_eq!(
        store.get("stats:2024-01").await.unwrap(),
        Some(json!({ "count": 3 }))
    );
    assert_eq!(
        store.peek("stats:2024-01").await.unwrap(),
        Some(json!({ "count": 3 }))
    );
    assert_eq!(store.get("missing").await.unwrap(), None);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_metadata_round_trip() {
    let store = client(&spawn_node().await);
    store
        .set("stats:2019-06", json!(1), TTL, Category::Historical)
        .await
        .unwrap();

    let meta = store.metadata("stats:2019-06").await.unwrap().unwrap();
    assert_eq!(meta.key, "stats:2019-06");
    assert_eq!(meta.category, Category::Historical);
    assert_eq!(meta.expires_at - meta.created_at, 60_000);
    assert!(store.metadata("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_keys_with_reserved_characters() {
    let store = client(&spawn_node().await);
    let key = "map:tile/12 4?zoom=3";
    store.set(key, json!("tile"), TTL, Category::Standard).await.unwrap();

    assert_eq!(store.get(key).await.unwrap(), Some(json!("tile")));
    assert_eq!(store.list_keys().await.unwrap(), vec![key.to_string()]);
    assert!(store.delete(key).await.unwrap());
    assert!(!store.delete(key).await.unwrap());
}

#[tokio::test]
async fn test_delete_matching_and_clear() {
    let store = client(&spawn_node().await);
    for key in ["crimes:2024-01", "stats:2024-01", "stats:2024-02"] {
        store.set(key, json!(key), TTL, Category::Standard).await.unwrap();
    }

    let pattern = Pattern::compile("^stats:").unwrap();
    assert_eq!(
        store.delete_matching(&pattern).await.unwrap(),
        vec!["stats:2024-01", "stats:2024-02"]
    );
    assert_eq!(store.size().await.unwrap(), 1);

    assert_eq!(store.clear().await.unwrap(), 1);
    assert_eq!(store.size().await.unwrap(), 0);
    assert_eq!(store.sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_node_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = client(&format!("http://{addr}"));
    let result = store.get("k").await;
    assert_err!(&result);
    assert!(matches!(result, Err(CacheError::BackendUnavailable(_))));
}

#[tokio::test]
async fn test_stalled_node_times_out() {
    let store = RemoteStore::new(&spawn_stalled_node().await, Duration::from_millis(200)).unwrap();

    let started = Instant::now();
    let result = store.get("stats:2024-01").await;

    assert!(matches!(result, Err(CacheError::BackendUnavailable(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// == Engine over a Remote Backend ==

#[tokio::test]
async fn test_engine_with_remote_backend() {
    let base_url = spawn_node().await;
    let config = Config {
        remote_store_url: Some(base_url.clone()),
        ..Config::default()
    };
    let engine = CacheEngine::new(config).unwrap();
    assert_eq!(engine.backend_name(), "remote");
    engine
        .register("stats:", |key: String| async move {
            Ok::<_, anyhow::Error>(json!({ "computed": key }))
        })
        .unwrap();

    let value = engine.get_or_compute("stats:2024-01").await.unwrap();
    assert_eq!(value, json!({ "computed": "stats:2024-01" }));

    // The value lives on the node, visible to any other client.
    let other = client(&base_url);
    assert_eq!(other.peek("stats:2024-01").await.unwrap(), Some(value));

    let report = engine.invalidate_by_pattern(&["2024-01".to_string()]).await;
    assert_eq!(report.invalidated, vec!["stats:2024-01"]);
    assert_eq!(other.size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_engine_degrades_when_node_is_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config {
        remote_store_url: Some(format!("http://{addr}")),
        ..Config::default()
    };
    let engine = CacheEngine::new(config).unwrap();
    engine
        .register("stats:", |_key: String| async move { Ok::<_, anyhow::Error>(json!(42)) })
        .unwrap();

    assert_eq!(engine.get("stats:2024-01").await, None);
    assert_eq!(engine.get_or_compute("stats:2024-01").await.unwrap(), json!(42));
    assert!(engine.stats().await.is_err());
}

#[tokio::test]
async fn test_engine_read_degrades_when_node_stalls() {
    let config = Config {
        remote_store_url: Some(spawn_stalled_node().await),
        backend_timeout: Duration::from_millis(200),
        ..Config::default()
    };
    let engine = CacheEngine::new(config).unwrap();

    let started = Instant::now();
    assert_eq!(engine.get("stats:2024-01").await, None);
    assert!(started.elapsed() < Duration::from_secs(2));
}
