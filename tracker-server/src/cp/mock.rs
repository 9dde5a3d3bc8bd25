//! In-memory train source for testing without API access.
//!
//! Serves canned station listings and train details, counts upstream calls
//! and can be told to fail for particular stations or trains.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;

use crate::domain::{StationId, TrainNumber};

use super::error::CpError;
use super::source::TrainSource;
use super::types::{TrainDetail, TrainSummary};

/// Mock source backed by in-memory maps.
#[derive(Default)]
pub struct MockSource {
    index: Mutex<Option<HashMap<String, String>>>,
    stations: Mutex<HashMap<String, Vec<TrainSummary>>>,
    details: Mutex<HashMap<String, TrainDetail>>,
    failing_stations: Mutex<HashSet<String>>,
    failing_trains: Mutex<HashSet<String>>,
    panicking_stations: Mutex<HashSet<String>>,
    detail_calls: Mutex<HashMap<String, usize>>,
    station_calls: AtomicUsize,
    index_calls: AtomicUsize,
    latency: Mutex<Duration>,
    stations_in_flight: InFlight,
    details_in_flight: InFlight,
}

/// Counts concurrent requests and remembers the highest count seen.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `index` from the station-index endpoint.
    pub fn with_index(self, index: &[(&str, &str)]) -> Self {
        let map = index
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect();
        *lock(&self.index) = Some(map);
        self
    }

    /// Serve `trains` for `station`.
    pub fn with_station(self, station: &str, trains: Vec<TrainSummary>) -> Self {
        lock(&self.stations).insert(station.to_string(), trains);
        self
    }

    /// Serve `detail` for train `number`.
    pub fn with_detail(self, number: u64, detail: TrainDetail) -> Self {
        self.set_detail(number, detail);
        self
    }

    /// Replace the detail served for train `number`.
    pub fn set_detail(&self, number: u64, detail: TrainDetail) {
        lock(&self.details).insert(number.to_string(), detail);
    }

    /// Make every request for `station` fail.
    pub fn fail_station(&self, station: &str) {
        lock(&self.failing_stations).insert(station.to_string());
    }

    /// Make every request for `station` panic, simulating an unexpected bug.
    pub fn panic_on_station(&self, station: &str) {
        lock(&self.panicking_stations).insert(station.to_string());
    }

    /// Stop panicking for `station`.
    pub fn recover_station(&self, station: &str) {
        lock(&self.panicking_stations).remove(station);
        lock(&self.failing_stations).remove(station);
    }

    /// Make every detail request for train `number` fail.
    pub fn fail_train(&self, number: u64) {
        lock(&self.failing_trains).insert(number.to_string());
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Number of detail requests made for train `number`.
    pub fn detail_calls(&self, number: u64) -> usize {
        lock(&self.detail_calls)
            .get(&number.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Number of detail requests made for all trains.
    pub fn total_detail_calls(&self) -> usize {
        lock(&self.detail_calls).values().sum()
    }

    /// Number of station-trains requests made.
    pub fn station_calls(&self) -> usize {
        self.station_calls.load(Ordering::SeqCst)
    }

    /// Number of station-index requests made.
    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Most station-trains requests ever in flight at once.
    pub fn peak_station_requests(&self) -> usize {
        self.stations_in_flight.peak()
    }

    /// Most train-detail requests ever in flight at once.
    pub fn peak_detail_requests(&self) -> usize {
        self.details_in_flight.peak()
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl TrainSource for MockSource {
    async fn station_index(&self) -> Result<HashMap<String, String>, CpError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        lock(&self.index)
            .clone()
            .ok_or_else(|| CpError::Unavailable("no mock station index".to_string()))
    }

    async fn station_trains(&self, station: &StationId) -> Result<Vec<TrainSummary>, CpError> {
        self.station_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.stations_in_flight.enter();
        self.simulate_latency().await;

        if lock(&self.panicking_stations).contains(station.as_str()) {
            panic!("mock panic for station {station}");
        }
        if lock(&self.failing_stations).contains(station.as_str()) {
            return Err(CpError::Api {
                status: 503,
                message: format!("mock failure for station {station}"),
            });
        }

        lock(&self.stations)
            .get(station.as_str())
            .cloned()
            .ok_or_else(|| CpError::Api {
                status: 404,
                message: format!("no mock data for station {station}"),
            })
    }

    async fn train_detail(&self, train: &TrainNumber) -> Result<TrainDetail, CpError> {
        *lock(&self.detail_calls)
            .entry(train.as_str().to_string())
            .or_default() += 1;
        let _in_flight = self.details_in_flight.enter();
        self.simulate_latency().await;

        if lock(&self.failing_trains).contains(train.as_str()) {
            return Err(CpError::Unavailable(format!("mock failure for train {train}")));
        }

        lock(&self.details)
            .get(train.as_str())
            .cloned()
            .ok_or(CpError::NotFound)
    }
}

/// A minimal station listing entry for train `number`.
pub fn summary(number: u64) -> TrainSummary {
    serde_json::from_value(json!({
        "trainNumber": number,
        "trainService": {"code": "R", "designation": "Regional"},
        "platform": "1",
        "delay": 0,
        "departureTime": "10:00",
        "trainOrigin": {"code": "94-31039", "designation": "LISBOA - ORIENTE"},
        "trainDestination": {"code": "94-2006", "designation": "PORTO - CAMPANHA"}
    }))
    .unwrap_or_default()
}

/// A train detail positioned at `lat`/`lng` with no stops.
pub fn detail_at(lat: f64, lng: f64) -> TrainDetail {
    detail_with_stops(lat, lng, &[])
}

/// A train detail positioned at `lat`/`lng` calling at `stops`, given as
/// `(code, designation, lat, lng)`.
pub fn detail_with_stops(lat: f64, lng: f64, stops: &[(&str, &str, f64, f64)]) -> TrainDetail {
    let stops: Vec<_> = stops
        .iter()
        .map(|(code, name, lat, lng)| {
            json!({
                "station": {"code": code, "designation": name},
                "latitude": lat.to_string(),
                "longitude": lng.to_string(),
                "arrival": "10:00",
                "departure": "10:01"
            })
        })
        .collect();

    TrainDetail::from_json(json!({
        "latitude": lat.to_string(),
        "longitude": lng.to_string(),
        "status": "IN_TRANSIT",
        "occupancy": 1,
        "trainStops": stops
    }))
    .unwrap_or_default()
}
