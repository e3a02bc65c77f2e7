//! Request DTOs for the cache node API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Category;

/// Request body for `POST /admin/invalidate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateRequest {
    /// Patterns processed in order
    pub patterns: Vec<String>,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.patterns.is_empty() {
            return Some("At least one pattern is required".to_string());
        }
        if self.patterns.iter().any(|p| p.is_empty()) {
            return Some("Patterns cannot be empty".to_string());
        }
        None
    }
}

/// Request body for `PUT /store/entries/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSetRequest {
    /// The value to store
    pub value: Value,
    /// TTL in milliseconds
    pub ttl_ms: u64,
    #[serde(default)]
    pub category: Category,
}

/// Request body for `POST /store/delete-matching`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMatchingRequest {
    pub pattern: String,
}

/// Query string of `GET /store/entries/{key}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetQuery {
    /// Read without touching access metadata or counters
    #[serde(default)]
    pub peek: bool,
}
