//! API Module
//!
//! HTTP handlers and routing for a cache node.
//!
//! # Endpoints
//! - `POST /admin/invalidate` - Invalidate keys matching patterns
//! - `POST /admin/invalidate-all` - Clear the cache
//! - `POST /admin/data-change` - Apply a data-change event
//! - `POST /admin/refresh` - Run a background refresh cycle now
//! - `POST /admin/warm` - Warm the configured keys now
//! - `GET /admin/stats` - Cache statistics
//! - `GET /health` - Health check endpoint
//! - `/store/...` - Remote store protocol served from this node's store

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
