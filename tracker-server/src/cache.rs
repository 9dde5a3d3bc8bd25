//! Time-bounded cache for train detail lookups.
//!
//! A train's position only matters for a few minutes, so detail responses are
//! memoized for a short TTL. There is no background sweeper: when the map
//! grows past its soft cap, entries older than the eviction age are purged
//! inside the insert path, under the same lock as the insert.
//!
//! Concurrent lookups for the same uncached train are not coalesced; both
//! callers fetch and the later insert wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cp::{TrainDetail, TrainSource};
use crate::domain::TrainNumber;

/// Configuration for the detail cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries younger than this are served without refetching (seconds).
    pub ttl_secs: u64,

    /// Entries older than this are purged when the cache is over capacity (seconds).
    pub evict_after_secs: u64,

    /// Soft cap on the number of cached entries.
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn evict_after(&self) -> Duration {
        Duration::from_secs(self.evict_after_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            evict_after_secs: 10 * 60,
            max_entries: 1000,
        }
    }
}

/// Source of "now" for entry ages.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

struct CacheEntry {
    value: Arc<TrainDetail>,
    fetched_at: Instant,
}

/// Memoizing layer over per-train detail lookups.
pub struct DetailCache<C = SystemClock> {
    entries: Mutex<HashMap<TrainNumber, CacheEntry>>,
    config: CacheConfig,
    clock: C,
}

impl DetailCache<SystemClock> {
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> DetailCache<C> {
    /// Create a cache that reads time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TrainNumber, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached detail for `train` if it is still fresh.
    pub fn get_fresh(&self, train: &TrainNumber) -> Option<Arc<TrainDetail>> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(train)?;
        (now.saturating_duration_since(entry.fetched_at) < self.config.ttl())
            .then(|| Arc::clone(&entry.value))
    }

    /// Return a fresh cached detail, or fetch, store and return a new one.
    ///
    /// Fetch failures are logged and yield `None`; they are never cached, so
    /// the next call retries.
    pub async fn get_or_fetch<S: TrainSource>(
        &self,
        source: &S,
        train: &TrainNumber,
    ) -> Option<Arc<TrainDetail>> {
        if let Some(hit) = self.get_fresh(train) {
            return Some(hit);
        }

        match source.train_detail(train).await {
            Ok(detail) => {
                let detail = Arc::new(detail);
                self.insert(train.clone(), Arc::clone(&detail));
                Some(detail)
            }
            Err(e) => {
                warn!(train = %train, error = %e, "Failed to fetch train details");
                None
            }
        }
    }

    /// Store `value` for `train`, purging aged entries first if over capacity.
    pub fn insert(&self, train: TrainNumber, value: Arc<TrainDetail>) {
        let now = self.clock.now();
        let evict_after = self.config.evict_after();
        let mut entries = self.lock();

        if entries.len() >= self.config.max_entries && !entries.contains_key(&train) {
            let before = entries.len();
            entries.retain(|_, e| now.saturating_duration_since(e.fetched_at) <= evict_after);
            debug!(
                evicted = before - entries.len(),
                remaining = entries.len(),
                "Purged aged train details"
            );
        }

        entries.insert(
            train,
            CacheEntry {
                value,
                fetched_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
