//! The train data service: poll scheduler plus consumer read API.
//!
//! One service object is built per process and shared with the web layer
//! through [`AppState`](crate::web::AppState). It owns the detail cache (via
//! its pipeline), the snapshot store and the station index.
//!
//! Lifecycle: `Stopped → Running` on [`TrainService::start`], back on
//! [`TrainService::stop`]. Stopping is cooperative: the shutdown flag is
//! observed at the top of each cycle and at the sleep between cycles, and
//! an in-flight cycle is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::DetailCache;
use crate::config::TrackerConfig;
use crate::cp::TrainSource;
use crate::domain::{BoundingBox, Coordinate, StationId};
use crate::enrich::EnrichedTrain;
use crate::pipeline::Pipeline;
use crate::snapshot::{Snapshot, SnapshotStore, TrainMap};
use crate::stations::{MajorStation, StationIndex, StationView, StationViews};

/// Poll cadence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause after a successful cycle (seconds).
    pub interval_secs: u64,

    /// Pause after a failed cycle (seconds).
    pub backoff_secs: u64,

    /// Requests in flight per fan-out phase.
    pub max_concurrent_requests: usize,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            backoff_secs: 30,
            max_concurrent_requests: crate::pipeline::DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// A running poll loop.
struct Worker {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Background aggregation service over a [`TrainSource`].
pub struct TrainService<S> {
    source: Arc<S>,
    pipeline: Arc<Pipeline<S>>,
    store: Arc<SnapshotStore>,
    stations: StationIndex,
    majors: Vec<MajorStation>,
    bounding_box: BoundingBox,
    interval: Duration,
    backoff: Duration,
    worker: Mutex<Option<Worker>>,
    index_loading: Arc<AtomicBool>,
}

impl<S: TrainSource + 'static> TrainService<S> {
    /// Create a stopped service.
    pub fn new(source: Arc<S>, config: &TrackerConfig) -> Self {
        let pipeline = Pipeline::new(
            Arc::clone(&source),
            DetailCache::new(config.cache.clone()),
            config.station_ids(),
            config.bounding_box,
        )
        .with_max_concurrent(config.poll.max_concurrent_requests);

        Self {
            source,
            pipeline: Arc::new(pipeline),
            store: Arc::new(SnapshotStore::new()),
            stations: StationIndex::new(),
            majors: config.major_stations.clone(),
            bounding_box: config.bounding_box,
            interval: config.poll.interval(),
            backoff: config.poll.backoff(),
            worker: Mutex::new(None),
            index_loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the poll pauses (sub-second values are useful in tests).
    pub fn with_poll_intervals(mut self, interval: Duration, backoff: Duration) -> Self {
        self.interval = interval;
        self.backoff = backoff;
        self
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start polling. No-op if already running.
    ///
    /// Also kicks off the one-shot station index load on its own task if
    /// the index has not been loaded yet.
    pub fn start(&self) {
        let mut slot = self.lock_worker();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("Train data service already running");
            return;
        }

        self.spawn_index_loader();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.store),
            self.interval,
            self.backoff,
            shutdown_rx,
        ));
        *slot = Some(Worker { handle, shutdown });

        info!(
            stations = self.pipeline.stations().len(),
            interval_secs = self.interval.as_secs_f64(),
            "Train data service started"
        );
    }

    /// Stop polling and wait for the loop to exit. Safe to call when not
    /// running and safe to call repeatedly.
    pub async fn stop(&self) {
        let Some(worker) = self.lock_worker().take() else {
            debug!("Train data service not running");
            return;
        };

        // Fails only if the loop already exited on its own.
        let _ = worker.shutdown.send(true);

        if let Err(e) = worker.handle.await {
            error!(error = %e, "Poll loop terminated abnormally");
        }
        info!("Train data service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn spawn_index_loader(&self) {
        if self.stations.is_loaded() || self.index_loading.swap(true, Ordering::SeqCst) {
            return;
        }

        let index = self.stations.clone();
        let source = Arc::clone(&self.source);
        let loading = Arc::clone(&self.index_loading);

        tokio::spawn(async move {
            if let Err(e) = index.load(source.as_ref()).await {
                error!(error = %e, "Failed to load station index");
            }
            loading.store(false, Ordering::SeqCst);
        });
    }

    /// The current snapshot as an immutable view.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.read()
    }

    /// Receiver notified after every published cycle.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.store.subscribe()
    }

    /// Copy of every published train, keyed by train id.
    pub fn get_all_trains(&self) -> TrainMap {
        self.store.read().trains.clone()
    }

    pub fn get_train_details(&self, train_id: &str) -> Option<EnrichedTrain> {
        self.store.read().get(train_id).cloned()
    }

    /// `[lng, lat]` route of a train; empty for unknown trains.
    pub fn get_train_route(&self, train_id: &str) -> Vec<[f64; 2]> {
        self.store
            .read()
            .get(train_id)
            .map(|t| t.route.clone())
            .unwrap_or_default()
    }

    pub fn get_all_stations(&self) -> Vec<StationView> {
        let snapshot = self.store.read();
        self.views(&snapshot).all_stations()
    }

    pub fn get_major_stations(&self) -> Vec<StationView> {
        let snapshot = self.store.read();
        self.views(&snapshot).major_stations()
    }

    pub fn are_stations_ready(&self) -> bool {
        self.stations.is_loaded()
    }

    pub fn get_station_coordinates_by_id(&self, id: &StationId) -> Option<Coordinate> {
        let snapshot = self.store.read();
        self.views(&snapshot).coordinates_of(id)
    }

    pub fn get_station_coordinates_by_name(&self, name: &str) -> Option<Coordinate> {
        let snapshot = self.store.read();
        self.views(&snapshot).coordinates_by_name(name)
    }

    pub fn station_index(&self) -> &StationIndex {
        &self.stations
    }

    /// Number of train details currently cached.
    pub fn cached_details(&self) -> usize {
        self.pipeline.cache().len()
    }

    fn views<'a>(&'a self, snapshot: &'a Snapshot) -> StationViews<'a> {
        StationViews::new(&self.stations, &self.majors, &self.bounding_box, snapshot)
    }
}

/// Run cycles until `shutdown` flips to true or its sender goes away.
async fn poll_loop<S: TrainSource + 'static>(
    pipeline: Arc<Pipeline<S>>,
    store: Arc<SnapshotStore>,
    interval: Duration,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // A panic inside the cycle surfaces as a JoinError instead of
        // killing the loop.
        let cycle = {
            let pipeline = Arc::clone(&pipeline);
            let store = Arc::clone(&store);
            tokio::spawn(async move { pipeline.run_cycle(&store).await })
        };

        let pause = match cycle.await {
            Ok(Ok(_)) => interval,
            Ok(Err(e)) => {
                error!(error = %e, backoff_secs = backoff.as_secs_f64(), "Poll cycle failed, keeping previous snapshot");
                backoff
            }
            Err(e) => {
                error!(error = %e, backoff_secs = backoff.as_secs_f64(), "Poll cycle aborted, keeping previous snapshot");
                backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Poll loop exited");
}
