//! Crime Cache - cache invalidation and refresh engine
//!
//! Stores computed crime-data query results keyed by query fingerprint and
//! keeps them fresh through pattern invalidation on data changes, scheduled
//! background refresh of popular entries and proactive warming.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod popularity;
pub mod registry;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{Category, EntryStore};
pub use config::Config;
pub use engine::{CacheEngine, CacheEngineBuilder};
pub use error::{CacheError, Result};
pub use invalidation::{DataChangeEvent, InvalidationReport};
pub use registry::Recompute;
