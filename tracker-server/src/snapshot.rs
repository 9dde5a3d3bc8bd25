//! Published view of all known trains.
//!
//! The store holds one immutable `Arc<Snapshot>` behind a `watch` channel.
//! Publishing swaps the `Arc`; reading clones it. Readers therefore always
//! see one whole cycle's mapping and never wait on a cycle in progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::enrich::EnrichedTrain;

/// Train id → record, as of one completed cycle.
pub type TrainMap = HashMap<String, EnrichedTrain>;

/// The world as of the last successful poll.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Number of publications before and including this one; 0 before the
    /// first cycle completes.
    pub version: u64,

    /// When this snapshot was published.
    pub published_at: Option<DateTime<Utc>>,

    pub trains: TrainMap,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    pub fn get(&self, train_id: &str) -> Option<&EnrichedTrain> {
        self.trains.get(train_id)
    }
}

/// Single-writer, many-reader holder of the current snapshot.
pub struct SnapshotStore {
    tx: watch::Sender<Arc<Snapshot>>,
    version: AtomicU64,
}

impl SnapshotStore {
    /// Create a store holding the empty snapshot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            tx,
            version: AtomicU64::new(0),
        }
    }

    /// Replace the visible snapshot with `trains`.
    pub fn publish(&self, trains: TrainMap) -> Arc<Snapshot> {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot {
            version,
            published_at: Some(Utc::now()),
            trains,
        });
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver that is notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
