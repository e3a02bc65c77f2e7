//! Response DTOs for the cache node API
//!
//! Defines the structure of outgoing HTTP response bodies. The remote store
//! backend decodes the same types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for `GET /store/entries/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for `PUT /store/entries/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetResponse {
    /// The key that was stored
    pub key: String,
    /// TTL applied, in milliseconds
    pub ttl_ms: u64,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            key: key.into(),
            ttl_ms,
        }
    }
}

/// Response body for `DELETE /store/entries/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Whether the key was present
    pub deleted: bool,
}

/// Response body for key listings and pattern deletes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

/// Response body for `DELETE /store/entries`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Response body for the stats endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Storage backend in use
    pub backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(backend: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for an out-of-band task trigger that found the task running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedResponse {
    pub skipped: bool,
    pub reason: String,
}

impl SkippedResponse {
    pub fn in_flight(task: &str) -> Self {
        Self {
            skipped: true,
            reason: format!("{task} task already running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_flattens_stats() {
        let resp = StatsResponse::from(CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            expired: 1,
            entries: 100,
            capacity: 1000,
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hits"], 80);
        assert_eq!(json["capacity"], 1000);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_stats_response_roundtrip_for_remote() {
        let json = r#"{"hits":1,"misses":1,"evictions":0,"expired":0,"entries":1,"capacity":10,"hit_rate":0.5}"#;
        let resp: StatsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.stats.capacity, 10);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy("memory");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("memory"));
        assert!(json.contains("timestamp"));
    }
}
