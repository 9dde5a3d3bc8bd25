//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query for station coordinate lookup.
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    /// Station name, matched case-insensitively
    pub name: String,
}

/// Coordinates found for a station name.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Route polyline of one train.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub train_id: String,

    /// `[lng, lat]` pairs in stop order
    pub route: Vec<[f64; 2]>,
}

/// Service health and snapshot metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the poll loop is running
    pub running: bool,

    /// Whether the station index has loaded
    pub stations_ready: bool,

    pub station_count: usize,
    pub train_count: usize,

    /// Incremented on every publish; 0 before the first
    pub snapshot_version: u64,

    pub last_update: Option<DateTime<Utc>>,
    pub cached_details: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
