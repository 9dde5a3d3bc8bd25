//! Station views derived from the station index and the current snapshot.
//!
//! Major stations come from configuration and are named through the index.
//! Every other station is *discovered* from the stops of published trains.
//! Telling the two apart is a best-effort name match (case-insensitive
//! substring either way), not an identity check: "PORTO" hides a discovered
//! "PORTO - CAMPANHA" when the former is a major station.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{BoundingBox, Coordinate, StationId, TrainNumber};
use crate::enrich::EnrichedTrain;
use crate::snapshot::Snapshot;

use super::index::StationIndex;

/// Most trains listed per station view.
pub const TRAINS_PER_STATION: usize = 5;

/// A station polled every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorStation {
    pub id: StationId,

    /// Used when no published train reports coordinates for this station.
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
}

impl MajorStation {
    pub fn new(id: StationId, coordinates: Option<Coordinate>) -> Self {
        Self { id, coordinates }
    }
}

/// The CP network's busiest stations, with approximate coordinates.
pub fn default_major_stations() -> Vec<MajorStation> {
    [
        ("94-31039", 38.7681, -9.0978), // Lisboa Oriente
        ("94-2006", 41.1496, -8.5856),  // Porto Campanhã
        ("94-73007", 37.0194, -7.9304), // Faro
        ("94-36004", 40.2033, -8.4103), // Coimbra-B
        ("94-30007", 38.7223, -9.1255), // Lisboa Santa Apolónia
        ("94-1008", 41.1456, -8.6109),  // Porto São Bento
        ("94-29157", 41.5479, -8.4347), // Braga
        ("94-83006", 38.5667, -7.9067), // Évora
    ]
    .into_iter()
    .filter_map(|(id, lat, lng)| {
        StationId::parse(id)
            .ok()
            .map(|id| MajorStation::new(id, Some(Coordinate::new(lat, lng))))
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    Major,
    Regular,
}

/// A train as listed under a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainBrief {
    pub train_id: String,
    pub train_number: TrainNumber,
    pub service_code: String,
    pub destination: String,
    pub delay: i64,
}

impl From<&EnrichedTrain> for TrainBrief {
    fn from(t: &EnrichedTrain) -> Self {
        Self {
            train_id: t.train_id.clone(),
            train_number: t.train_number.clone(),
            service_code: t.service_code.clone(),
            destination: t.destination.clone(),
            delay: t.delay,
        }
    }
}

/// A station as shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationView {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: StationKind,
    pub has_trains: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trains: Option<Vec<TrainBrief>>,
}

/// Read-only projection over one snapshot.
pub struct StationViews<'a> {
    index: &'a StationIndex,
    majors: &'a [MajorStation],
    bounding_box: &'a BoundingBox,
    /// Published trains ordered by id, for stable output.
    trains: Vec<&'a EnrichedTrain>,
}

impl<'a> StationViews<'a> {
    pub fn new(
        index: &'a StationIndex,
        majors: &'a [MajorStation],
        bounding_box: &'a BoundingBox,
        snapshot: &'a Snapshot,
    ) -> Self {
        let mut trains: Vec<_> = snapshot.trains.values().collect();
        trains.sort_by(|a, b| a.train_id.cmp(&b.train_id));
        Self {
            index,
            majors,
            bounding_box,
            trains,
        }
    }

    /// Major stations with a known name and position. Empty until the index
    /// has loaded.
    pub fn major_stations(&self) -> Vec<StationView> {
        self.majors
            .iter()
            .filter_map(|m| {
                let mut view = self.major_view(m)?;
                view.has_trains = self.trains.iter().any(|t| serves(t, &m.id));
                Some(view)
            })
            .collect()
    }

    /// Major stations with their trains, followed by discovered stations.
    /// Empty until the index has loaded.
    pub fn all_stations(&self) -> Vec<StationView> {
        if !self.index.is_loaded() {
            return Vec::new();
        }

        let mut views = Vec::new();
        let mut major_names = Vec::new();

        for major in self.majors {
            let Some(mut view) = self.major_view(major) else {
                continue;
            };
            let trains = self.trains_at(&major.id);
            view.has_trains = !trains.is_empty();
            view.trains = Some(trains);
            major_names.push(view.name.to_lowercase());
            views.push(view);
        }

        views.extend(self.discovered_stations(&major_names));
        views
    }

    /// Position of a station: from published stop data if any train calls
    /// there, else the configured fallback.
    pub fn coordinates_of(&self, id: &StationId) -> Option<Coordinate> {
        self.trains
            .iter()
            .flat_map(|t| t.train_stops.iter())
            .filter(|s| s.code() == Some(id.as_str()))
            .find_map(|s| s.position())
            .or_else(|| {
                self.majors
                    .iter()
                    .find(|m| &m.id == id)
                    .and_then(|m| m.coordinates)
            })
    }

    /// Position of a station by name, ignoring case. Tries the index first,
    /// then stop names of published trains.
    pub fn coordinates_by_name(&self, name: &str) -> Option<Coordinate> {
        if let Some(c) = self
            .index
            .id_for_name(name)
            .and_then(|id| self.coordinates_of(id))
        {
            return Some(c);
        }

        let wanted = name.to_lowercase();
        self.trains
            .iter()
            .flat_map(|t| t.train_stops.iter())
            .filter(|s| s.name().is_some_and(|n| n.to_lowercase() == wanted))
            .find_map(|s| s.position())
    }

    fn major_view(&self, major: &MajorStation) -> Option<StationView> {
        let name = self.index.name_of(&major.id)?;
        let position = self.coordinates_of(&major.id)?;
        Some(StationView {
            station_id: major.id.to_string(),
            name: title_case(name),
            lat: position.lat,
            lng: position.lng,
            kind: StationKind::Major,
            has_trains: false,
            trains: None,
        })
    }

    /// Trains listed at or calling at `id`, at most [`TRAINS_PER_STATION`].
    fn trains_at(&self, id: &StationId) -> Vec<TrainBrief> {
        self.trains
            .iter()
            .filter(|t| serves(t, id))
            .take(TRAINS_PER_STATION)
            .map(|t| TrainBrief::from(*t))
            .collect()
    }

    fn discovered_stations(&self, major_names: &[String]) -> Vec<StationView> {
        let is_major = |name: &str| {
            let name = name.to_lowercase();
            major_names
                .iter()
                .any(|m| name.contains(m.as_str()) || m.contains(name.as_str()))
        };

        // Keyed by upstream name; first sighting fixes the position.
        let mut order: Vec<(String, Coordinate)> = Vec::new();
        let mut trains_by_name: HashMap<String, Vec<TrainBrief>> = HashMap::new();
        let mut ruled_out: HashSet<String> = HashSet::new();

        for train in &self.trains {
            for stop in &train.train_stops {
                let Some(name) = stop.name() else { continue };
                if ruled_out.contains(name) {
                    continue;
                }
                let Some(position) = stop.position().filter(|p| self.bounding_box.contains(*p))
                else {
                    continue;
                };
                if is_major(name) {
                    ruled_out.insert(name.to_string());
                    continue;
                }

                let listed = trains_by_name.entry(name.to_string()).or_insert_with(|| {
                    order.push((name.to_string(), position));
                    Vec::new()
                });
                if listed.len() < TRAINS_PER_STATION
                    && !listed.iter().any(|b| b.train_id == train.train_id)
                {
                    listed.push(TrainBrief::from(*train));
                }
            }
        }

        order
            .into_iter()
            .map(|(name, position)| {
                let trains = trains_by_name.remove(&name).unwrap_or_default();
                StationView {
                    station_id: format!("discovered_{}", name.replace(' ', "_")),
                    name: title_case(&name),
                    lat: position.lat,
                    lng: position.lng,
                    kind: StationKind::Regular,
                    has_trains: !trains.is_empty(),
                    trains: Some(trains),
                }
            })
            .collect()
    }
}

/// Whether `train` was listed at or calls at station `id`.
fn serves(train: &EnrichedTrain, id: &StationId) -> bool {
    &train.source_station == id || train.calls_at(id)
}

/// Capitalize the first letter of every word and lower-case the rest.
///
/// A word starts after any non-alphabetic character, so
/// `"PORTO - SAO BENTO"` becomes `"Porto - Sao Bento"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
