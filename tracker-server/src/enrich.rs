//! Published train records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cp::{TrainDetail, TrainStop, TrainSummary};
use crate::domain::{Coordinate, StationId, TrainNumber};

/// A train as published in a snapshot: station listing, live detail and the
/// derived route merged into one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTrain {
    pub train_id: String,
    pub train_number: TrainNumber,
    pub service_code: String,
    pub service_name: String,
    pub lat: f64,
    pub lng: f64,
    pub status: String,
    pub delay: i64,
    pub origin: String,
    pub destination: String,
    pub platform: Option<String>,
    pub occupancy: Option<Value>,
    pub eta: Option<String>,
    pub etd: Option<String>,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    /// `[lng, lat]` pairs of the stops with usable coordinates, in order.
    pub route: Vec<[f64; 2]>,
    pub train_stops: Vec<TrainStop>,
    /// The station whose listing this train was discovered through.
    pub source_station: StationId,
    pub last_update: DateTime<Utc>,
    /// Untouched upstream detail payload.
    pub full_details: Value,
}

impl EnrichedTrain {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Whether any stop of this train has the given station code.
    pub fn calls_at(&self, station: &StationId) -> bool {
        self.train_stops
            .iter()
            .any(|s| s.code() == Some(station.as_str()))
    }
}

/// Merge a station listing entry with its live detail.
///
/// `position` is the already-validated position from `detail`.
pub fn assemble(
    number: TrainNumber,
    summary: &TrainSummary,
    source_station: StationId,
    detail: &TrainDetail,
    position: Coordinate,
    now: DateTime<Utc>,
) -> EnrichedTrain {
    let service = summary.train_service.clone().unwrap_or_default();
    let designation = |place: &Option<crate::cp::Designation>| {
        place
            .as_ref()
            .and_then(|p| p.designation.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    };

    EnrichedTrain {
        train_id: number.as_str().to_string(),
        train_number: number,
        service_code: service.code.unwrap_or_else(|| "T".to_string()),
        service_name: service.designation.unwrap_or_else(|| "Train".to_string()),
        lat: position.lat,
        lng: position.lng,
        status: detail
            .status
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        delay: summary.delay,
        origin: designation(&summary.train_origin),
        destination: designation(&summary.train_destination),
        platform: summary.platform.clone(),
        occupancy: summary
            .occupancy
            .clone()
            .filter(|o| !o.is_null())
            .or_else(|| detail.occupancy.clone()),
        eta: summary.eta.clone(),
        etd: summary.etd.clone(),
        arrival_time: summary.arrival_time.clone(),
        departure_time: summary.departure_time.clone(),
        route: route_from_stops(&detail.train_stops),
        train_stops: detail.train_stops.clone(),
        source_station,
        last_update: now,
        full_details: detail.raw.clone(),
    }
}

/// Ordered `[lng, lat]` pairs of the stops whose coordinates parse.
pub fn route_from_stops(stops: &[TrainStop]) -> Vec<[f64; 2]> {
    stops
        .iter()
        .filter_map(TrainStop::position)
        .map(Coordinate::to_lng_lat)
        .collect()
}
