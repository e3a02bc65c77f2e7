//! Invalidation Module
//!
//! Pattern invalidation, full clears, data-change handling, background
//! refresh and warming. Every operation returns an [`InvalidationReport`].

mod event;
mod report;
mod service;
mod strategy;

pub use event::{ChangeMetadata, DataChangeEvent, EventTimestamp, Location, Month, Operation};
pub use report::{InvalidationReport, ItemError};
pub use service::{InvalidationService, ALL_KEYS};
pub use strategy::{CrimeDataStrategy, PatternStrategy};
