//! Background Scheduler
//!
//! Runs the refresh task, the warming task and the expiry sweep on their
//! own jittered intervals.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::periodic::{jittered, spawn_periodic, InFlight, Schedule};
use crate::cache::EntryStore;
use crate::invalidation::{InvalidationReport, InvalidationService};

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct Scheduler {
    service: Arc<InvalidationService>,
    store: Arc<dyn EntryStore>,
    refresh: InFlight,
    warming: InFlight,
    sweep: InFlight,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(service: Arc<InvalidationService>, store: Arc<dyn EntryStore>) -> Self {
        Self {
            service,
            store,
            refresh: InFlight::new(),
            warming: InFlight::new(),
            sweep: InFlight::new(),
            running: Mutex::new(None),
        }
    }

    // == Lifecycle ==
    /// Spawns the enabled loops. Calling it again while running does nothing.
    pub fn start(&self) {
        let mut running = self.lock_running();
        if running.is_some() {
            warn!("Scheduler already running");
            return;
        }

        let config = self.service.config();
        let (shutdown, rx) = watch::channel(false);
        let mut handles = Vec::new();

        if config.refresh_enabled {
            let service = Arc::clone(&self.service);
            handles.push(spawn_periodic(
                "refresh",
                Schedule {
                    interval: config.refresh_interval,
                    first_delay: jittered(config.refresh_interval, config.jitter_ratio),
                    jitter_ratio: config.jitter_ratio,
                },
                self.refresh.clone(),
                rx.clone(),
                move || {
                    let service = Arc::clone(&service);
                    async move {
                        let report = service.background_refresh().await;
                        if report.has_errors() {
                            warn!(failed = report.errors.len(), "Refresh cycle had failures");
                        }
                    }
                },
            ));
        }

        if config.warming_enabled {
            let service = Arc::clone(&self.service);
            let first_delay = config
                .warming_startup_delay
                .unwrap_or_else(|| jittered(config.warming_interval, config.jitter_ratio));
            handles.push(spawn_periodic(
                "warming",
                Schedule {
                    interval: config.warming_interval,
                    first_delay,
                    jitter_ratio: config.jitter_ratio,
                },
                self.warming.clone(),
                rx.clone(),
                move || {
                    let service = Arc::clone(&service);
                    async move {
                        let keys = service.config().warm_keys.clone();
                        service.warm(&keys).await;
                    }
                },
            ));
        }

        let store = Arc::clone(&self.store);
        handles.push(spawn_periodic(
            "sweep",
            Schedule {
                interval: config.sweep_interval,
                first_delay: jittered(config.sweep_interval, config.jitter_ratio),
                jitter_ratio: config.jitter_ratio,
            },
            self.sweep.clone(),
            rx,
            move || {
                let store = Arc::clone(&store);
                async move { sweep(store.as_ref()).await }
            },
        ));

        info!(tasks = handles.len(), "Scheduler started");
        *running = Some(Running { shutdown, handles });
    }

    /// Signals every loop to stop and waits for them to finish.
    pub async fn stop(&self) {
        let Some(running) = self.lock_running().take() else {
            return;
        };
        // Receivers may already be gone if a loop panicked.
        let _ = running.shutdown.send(true);
        for handle in running.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Scheduler task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    // == Out-of-Band Triggers ==
    /// Runs a refresh cycle now, or returns `None` if one is in flight.
    pub async fn run_refresh_now(&self) -> Option<InvalidationReport> {
        let _guard = self.refresh.try_acquire()?;
        Some(self.service.background_refresh().await)
    }

    /// Runs a warming cycle now, or returns `None` if one is in flight.
    pub async fn run_warming_now(&self) -> Option<InvalidationReport> {
        let _guard = self.warming.try_acquire()?;
        let keys = self.service.config().warm_keys.clone();
        Some(self.service.warm(&keys).await)
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op = "scheduler", "Recovered from poisoned scheduler lock");
                poisoned.into_inner()
            }
        }
    }
}

async fn sweep(store: &dyn EntryStore) {
    match store.sweep_expired().await {
        Ok(0) => debug!("TTL sweep: no expired entries found"),
        Ok(removed) => info!(removed, "TTL sweep: removed expired entries"),
        Err(err) => warn!(error = %err, "TTL sweep failed"),
    }
}
