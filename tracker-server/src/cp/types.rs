//! CP API response DTOs.
//!
//! These types map directly to the CP "spring" JSON endpoints. The upstream
//! is loosely typed: numbers arrive as strings and vice versa, and fields are
//! omitted or sent as `null` interchangeably, so almost everything is an
//! `Option` and a few fields go through lenient deserializers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Coordinate, TrainNumber};

/// A `{code, designation}` pair, used for services, origins, destinations
/// and stop stations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Designation {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub code: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub designation: Option<String>,
}

/// One train listed by the station-trains endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainSummary {
    /// Usually a JSON number; see [`TrainSummary::number`].
    #[serde(default)]
    pub train_number: Option<Value>,

    /// Service category, e.g. `{code: "IC", designation: "Intercidades"}`.
    #[serde(default, deserialize_with = "lenient::opt_designation")]
    pub train_service: Option<Designation>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub platform: Option<String>,

    /// Delay in minutes. Absent or null means on time.
    #[serde(default, deserialize_with = "lenient::delay")]
    pub delay: i64,

    /// Estimated arrival, display string.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub eta: Option<String>,

    /// Estimated departure, display string.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub etd: Option<String>,

    /// Scheduled arrival, display string.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival_time: Option<String>,

    /// Scheduled departure, display string.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub departure_time: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_designation")]
    pub train_origin: Option<Designation>,

    #[serde(default, deserialize_with = "lenient::opt_designation")]
    pub train_destination: Option<Designation>,

    #[serde(default)]
    pub occupancy: Option<Value>,
}

impl TrainSummary {
    /// The train number in canonical string form, if present and usable.
    pub fn number(&self) -> Option<TrainNumber> {
        self.train_number.as_ref().and_then(TrainNumber::from_json)
    }
}

/// One stop in a train's itinerary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainStop {
    #[serde(default, deserialize_with = "lenient::opt_designation")]
    pub station: Option<Designation>,

    /// Some payloads carry the stop name here instead of under `station`.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub designation: Option<String>,

    #[serde(default)]
    pub latitude: Option<Value>,

    #[serde(default)]
    pub longitude: Option<Value>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub departure: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub platform: Option<String>,
}

impl TrainStop {
    /// Stop name, preferring the nested station designation.
    pub fn name(&self) -> Option<&str> {
        self.station
            .as_ref()
            .and_then(|s| s.designation.as_deref())
            .or(self.designation.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// Station code of the stop, comparable with station ids.
    pub fn code(&self) -> Option<&str> {
        self.station.as_ref().and_then(|s| s.code.as_deref())
    }

    pub fn position(&self) -> Option<Coordinate> {
        Coordinate::from_json(self.latitude.as_ref(), self.longitude.as_ref())
    }
}

/// Response of the train-detail endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainDetail {
    #[serde(default)]
    pub latitude: Option<Value>,

    #[serde(default)]
    pub longitude: Option<Value>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,

    #[serde(default)]
    pub occupancy: Option<Value>,

    /// Stops that do not decode are skipped; the train itself is kept.
    #[serde(default, deserialize_with = "lenient::stops")]
    pub train_stops: Vec<TrainStop>,

    /// The complete upstream payload, kept for on-demand detail rendering.
    #[serde(skip)]
    pub raw: Value,
}

impl TrainDetail {
    /// Decode a detail payload, keeping the original JSON alongside.
    pub fn from_json(raw: Value) -> Result<Self, serde_json::Error> {
        let mut detail = TrainDetail::deserialize(&raw)?;
        detail.raw = raw;
        Ok(detail)
    }

    /// Current reported position, if both components parse.
    pub fn position(&self) -> Option<Coordinate> {
        Coordinate::from_json(self.latitude.as_ref(), self.longitude.as_ref())
    }
}

/// Deserializers tolerant of the upstream's loose typing.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Designation, TrainStop};

    /// Strings pass through, numbers and booleans are stringified, anything
    /// else becomes `None`.
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Whole minutes; null, blank or garbage counts as zero.
    pub fn delay<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    /// A `{code, designation}` object; any other shape becomes `None`.
    pub fn opt_designation<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Designation>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(v @ Value::Object(_)) => Designation::deserialize(v).ok(),
            _ => None,
        })
    }

    /// An array of stops, dropping entries that do not decode. Null or a
    /// non-array yields no stops.
    pub fn stops<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TrainStop>, D::Error> {
        let Some(Value::Array(items)) = Option::<Value>::deserialize(d)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| TrainStop::deserialize(item).ok())
            .collect())
    }
}
