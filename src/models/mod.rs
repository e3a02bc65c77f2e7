//! Request and Response models for the cache node API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies, both by the
//! node's handlers and by the remote store client.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{DeleteMatchingRequest, GetQuery, InvalidateRequest, StoreSetRequest};
pub use responses::{
    CountResponse, DeleteResponse, GetResponse, HealthResponse, KeysResponse, SetResponse,
    SkippedResponse, StatsResponse,
};
