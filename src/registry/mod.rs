//! Key Registry Module
//!
//! Associates keys with the recompute function that rebuilds them, and
//! matches invalidation patterns against live keys.

mod matcher;
mod recompute;

pub use matcher::{match_keys, Pattern};
pub use recompute::{KeyRegistry, Recompute, WithCategory};
