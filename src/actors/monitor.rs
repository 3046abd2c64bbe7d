//! MonitorActor - periodic host resource sampling
//!
//! Runs the daemon's only background loop: sample cpu/memory/disk, classify
//! each against the current configuration snapshot, publish the resulting
//! health snapshot, and emit transition events on status edges.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Sampler (spawn_blocking, timeout-bounded) → classify
//!     │             └── stuck read → Unknown for this tick
//!     ├──► watch::Sender<HealthSnapshot>   (latest-value slot)
//!     └──► broadcast::Sender<TransitionEvent>   (edges only)
//! ```
//!
//! The sampler runs on the blocking pool behind a `try_lock`: if a previous
//! read is still stuck when the next tick fires, the tick records `Unknown`
//! instead of piling up blocked threads, and the loop keeps its cadence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::config::{Config, ConfigStore};
use crate::monitors::resources::{Readings, Sampler, classify};
use crate::{HealthSnapshot, ResourceKind, ResourceSample, ResourceStatus};

use super::messages::{MonitorCommand, TransitionEvent};

/// Upper bound on how long one sampling pass may take.
const MAX_SAMPLE_DURATION: Duration = Duration::from_secs(10);

/// Actor that owns the sampling loop
pub struct MonitorActor<S: Sampler> {
    store: Arc<ConfigStore>,

    /// Shared with in-flight blocking reads; `try_lock` keeps a stuck read
    /// from stalling subsequent ticks
    sampler: Arc<StdMutex<S>>,

    command_rx: mpsc::Receiver<MonitorCommand>,

    event_tx: broadcast::Sender<TransitionEvent>,

    health_tx: watch::Sender<HealthSnapshot>,

    /// Status per resource at the previous tick, for edge detection
    previous: HashMap<ResourceKind, ResourceStatus>,
}

impl<S: Sampler> MonitorActor<S> {
    fn new(
        store: Arc<ConfigStore>,
        sampler: S,
        command_rx: mpsc::Receiver<MonitorCommand>,
        event_tx: broadcast::Sender<TransitionEvent>,
        health_tx: watch::Sender<HealthSnapshot>,
    ) -> Self {
        let previous = ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, ResourceStatus::Unknown))
            .collect();

        Self {
            store,
            sampler: Arc::new(StdMutex::new(sampler)),
            command_rx,
            event_tx,
            health_tx,
            previous,
        }
    }

    /// Run the actor's main loop
    ///
    /// The interval is re-read from the configuration store on every
    /// iteration, so a reload takes effect on the next tick.
    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting monitor actor");

        loop {
            let interval = self.store.get().monitoring.check_interval_seconds;

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                    self.tick().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::SampleNow { respond_to }) => {
                            debug!("received SampleNow command");
                            self.tick().await;
                            let _ = respond_to.send(());
                        }

                        Some(MonitorCommand::ConfigChanged) => {
                            trace!("configuration changed, rescheduling next tick");
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("monitor actor stopped");
    }

    /// One sampling tick: read, classify, publish.
    async fn tick(&mut self) {
        // One snapshot for the whole tick; a concurrent reload applies from
        // the next tick onward.
        let config = self.store.get();

        let readings = self.read_resources(&config).await;
        let now = Utc::now();

        let snapshot = HealthSnapshot {
            cpu: classify_reading(readings.cpu, &config, ResourceKind::Cpu),
            memory: classify_reading(readings.memory, &config, ResourceKind::Memory),
            disk: classify_reading(readings.disk, &config, ResourceKind::Disk),
            sampled_at: Some(now),
        };

        for kind in ResourceKind::ALL {
            let sample = snapshot.get(kind);
            let previous = self
                .previous
                .insert(kind, sample.status)
                .unwrap_or(ResourceStatus::Unknown);

            if previous == sample.status {
                continue;
            }

            trace!("{kind} status changed: {previous} -> {}", sample.status);

            let event = TransitionEvent {
                resource: kind,
                previous,
                current: sample.status,
                value: sample.value,
                timestamp: now,
            };

            // No subscribers is fine; transitions are re-derived each edge.
            if self.event_tx.send(event).is_err() {
                trace!("no receivers for transition event");
            }
        }

        self.health_tx.send_replace(snapshot);
    }

    /// Run the sampler on the blocking pool, bounded by a timeout.
    ///
    /// Returns empty readings (everything `Unknown`) when the read times out,
    /// panics, or a previous read is still in flight.
    async fn read_resources(&self, config: &Config) -> Readings {
        let timeout = Duration::from_secs(config.monitoring.check_interval_seconds)
            .min(MAX_SAMPLE_DURATION);

        let sampler = Arc::clone(&self.sampler);
        let task = tokio::task::spawn_blocking(move || match sampler.try_lock() {
            Ok(mut sampler) => sampler.sample(),
            Err(_) => {
                warn!("previous resource read still in flight, skipping this tick");
                Readings::default()
            }
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(readings)) => readings,
            Ok(Err(e)) => {
                error!("resource sampling task failed: {e}");
                Readings::default()
            }
            Err(_) => {
                warn!("resource sampling timed out after {timeout:?}");
                Readings::default()
            }
        }
    }
}

fn classify_reading(value: Option<f64>, config: &Config, kind: ResourceKind) -> ResourceSample {
    match value {
        Some(value) => ResourceSample {
            value: Some(value),
            status: classify(value, config.monitoring.thresholds(kind)),
        },
        None => ResourceSample::unknown(),
    }
}

/// Handle for controlling the MonitorActor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    health_rx: watch::Receiver<HealthSnapshot>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl MonitorHandle {
    /// Spawn the monitor actor.
    ///
    /// `event_tx` receives a [`TransitionEvent`] for every status edge;
    /// subscribe before the first tick to observe all of them.
    pub fn spawn<S: Sampler>(
        store: Arc<ConfigStore>,
        sampler: S,
        event_tx: broadcast::Sender<TransitionEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (health_tx, health_rx) = watch::channel(HealthSnapshot::unknown());

        let actor = MonitorActor::new(store, sampler, cmd_rx, event_tx, health_tx);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            health_rx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Latest health snapshot, without blocking on the sampling loop.
    ///
    /// Returns the unknown snapshot before the first tick completes.
    pub fn health(&self) -> HealthSnapshot {
        self.health_rx.borrow().clone()
    }

    /// Trigger an immediate sampling tick and wait for it to finish.
    pub async fn sample_now(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(MonitorCommand::SampleNow { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Nudge the loop to re-read the configuration snapshot.
    ///
    /// Callable from a sync context (registered as a config change callback).
    pub fn config_changed(&self) {
        let _ = self.sender.try_send(MonitorCommand::ConfigChanged);
    }

    /// Stop the sampling loop and wait until it has fully terminated.
    ///
    /// Idempotent; concurrent and repeated calls are safe.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("monitor actor task failed: {e}");
            }
        }
    }
}
