//! Background Tasks Module
//!
//! Periodic jobs that keep the cache fresh: background refresh, warming and
//! the expiry sweep, driven by the [`Scheduler`].

mod periodic;
mod scheduler;

pub use periodic::{jittered, spawn_periodic, InFlight, InFlightGuard, Schedule};
pub use scheduler::Scheduler;
