//! Outcome of an invalidation or refresh operation.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A failure tied to one pattern or key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item: String,
    pub message: String,
}

/// What an operation removed, what it recomputed and what failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReport {
    /// Removed keys, or `"all"` after a full clear
    pub invalidated: Vec<String>,
    /// Keys recomputed and stored again
    pub refreshed: Vec<String>,
    pub errors: Vec<ItemError>,
}

impl InvalidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_error(&mut self, item: impl Into<String>, error: impl Display) {
        self.errors.push(ItemError {
            item: item.into(),
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
