//! Jittered periodic jobs.
//!
//! Each job runs in its own spawned loop: sleep, run, repeat. A loop awaits
//! its job before sleeping again, and an [`InFlight`] flag shared with
//! out-of-band triggers keeps one instance of a job running at a time.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// == In-Flight Flag ==
/// Marks a job as running.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag, or returns `None` when the job is already running.
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.0)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, including when the job future is dropped.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Jitter ==
/// `interval` scaled by a random factor in `[1 - ratio, 1 + ratio]`.
pub fn jittered(interval: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 || interval.is_zero() {
        return interval;
    }
    let ratio = ratio.min(1.0);
    let factor = rand::thread_rng().gen_range((1.0 - ratio)..=(1.0 + ratio));
    interval.mul_f64(factor)
}

// == Periodic Loop ==
/// Timing of one periodic job.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    /// Delay before the first run
    pub first_delay: Duration,
    pub jitter_ratio: f64,
}

/// Spawns a loop running `job` on `schedule` until `shutdown` changes or its
/// sender is dropped.
///
/// A job still running at shutdown is dropped at its next await point.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    in_flight: InFlight,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            task = name,
            interval_secs = schedule.interval.as_secs(),
            "Starting periodic task"
        );
        let mut delay = schedule.first_delay;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }

            match in_flight.try_acquire() {
                Some(_guard) => {
                    tokio::select! {
                        _ = job() => {}
                        _ = shutdown.changed() => {
                            info!(task = name, "Interrupted running task for shutdown");
                            break;
                        }
                    }
                }
                None => debug!(task = name, "Skipping run, task already in flight"),
            }

            delay = jittered(schedule.interval, schedule.jitter_ratio);
        }

        info!(task = name, "Periodic task stopped");
    })
}
