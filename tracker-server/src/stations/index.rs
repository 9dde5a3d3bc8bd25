//! Station name ↔ id lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::cp::{CpError, TrainSource};
use crate::domain::StationId;

/// One entry of the station index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub name: String,
    pub id: StationId,
}

struct Index {
    /// Lower-cased name → id.
    by_name: HashMap<String, StationId>,
    /// Id → upstream name. When several names share an id the
    /// alphabetically first wins.
    by_id: HashMap<StationId, String>,
    records: Vec<StationRecord>,
}

/// Thread-safe station index, loaded once at startup.
///
/// Until the load completes every lookup misses. After it completes the
/// index is never written again, so readers need no coordination.
#[derive(Clone, Default)]
pub struct StationIndex {
    inner: Arc<OnceLock<Index>>,
}

impl StationIndex {
    /// Create an empty, not-yet-loaded index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index that is already loaded with `raw` (for tests and
    /// offline use).
    pub fn from_raw(raw: HashMap<String, String>) -> Self {
        let index = Self::new();
        let _ = index.inner.set(build_index(raw));
        index
    }

    /// Fetch the index from `source`. A second call after a successful load
    /// returns immediately without fetching.
    pub async fn load<S: TrainSource>(&self, source: &S) -> Result<usize, CpError> {
        if let Some(index) = self.inner.get() {
            return Ok(index.records.len());
        }

        let raw = source.station_index().await?;
        let fetched = raw.len();
        let _ = self.inner.set(build_index(raw));

        let loaded = self.len();
        info!(loaded, skipped = fetched.saturating_sub(loaded), "Loaded station index");
        Ok(loaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.get().map_or(0, |i| i.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upstream name of a station id.
    pub fn name_of(&self, id: &StationId) -> Option<&str> {
        self.inner.get()?.by_id.get(id).map(String::as_str)
    }

    /// Station id for a name, ignoring case.
    pub fn id_for_name(&self, name: &str) -> Option<&StationId> {
        self.inner.get()?.by_name.get(&name.to_lowercase())
    }

    /// All stations, sorted by name.
    pub fn records(&self) -> &[StationRecord] {
        match self.inner.get() {
            Some(index) => &index.records,
            None => &[],
        }
    }
}

/// Build the lookup maps, dropping entries whose id does not parse.
fn build_index(raw: HashMap<String, String>) -> Index {
    let sorted: BTreeMap<String, String> = raw.into_iter().collect();

    let mut by_name = HashMap::with_capacity(sorted.len());
    let mut by_id = HashMap::with_capacity(sorted.len());
    let mut records = Vec::with_capacity(sorted.len());

    for (name, id) in sorted {
        let Ok(id) = StationId::parse(id.trim()) else {
            debug!(station = %name, id = %id, "Skipping station with malformed id");
            continue;
        };
        by_name.insert(name.to_lowercase(), id.clone());
        by_id.entry(id.clone()).or_insert_with(|| name.clone());
        records.push(StationRecord { name, id });
    }

    Index {
        by_name,
        by_id,
        records,
    }
}
