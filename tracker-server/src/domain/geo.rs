//! Coordinates and the operating-region bounding box.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned when a bounding box is empty or inverted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid bounding box: {reason}")]
pub struct InvalidBoundingBox {
    reason: &'static str,
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// GeoJSON ordering: `[longitude, latitude]`.
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Parse a position from the loosely typed latitude/longitude pair the
    /// CP API sends (numbers, numeric strings, empty strings or null).
    pub fn from_json(lat: Option<&Value>, lng: Option<&Value>) -> Option<Self> {
        let lat = parse_degrees(lat?)?;
        let lng = parse_degrees(lng?)?;
        Some(Self { lat, lng })
    }
}

/// Parse one coordinate component.
///
/// Returns `None` for null, blank strings, unparsable strings and non-finite
/// values.
pub fn parse_degrees(value: &Value) -> Option<f64> {
    let degrees = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    degrees.is_finite().then_some(degrees)
}

/// Geographic rectangle that reported positions must fall inside.
///
/// Bounds are inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Mainland Portugal, the CP operating region.
    pub const PORTUGAL: BoundingBox = BoundingBox {
        min_lat: 36.0,
        max_lat: 42.5,
        min_lng: -10.0,
        max_lng: -6.0,
    };

    /// Create a bounding box, checking that it is non-empty.
    pub fn new(
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Result<Self, InvalidBoundingBox> {
        let bbox = Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check the box is finite, within WGS84 ranges and not inverted.
    pub fn validate(&self) -> Result<(), InvalidBoundingBox> {
        let edges = [self.min_lat, self.max_lat, self.min_lng, self.max_lng];
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(InvalidBoundingBox {
                reason: "edges must be finite",
            });
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err(InvalidBoundingBox {
                reason: "latitude must be within [-90, 90]",
            });
        }
        if self.min_lng < -180.0 || self.max_lng > 180.0 {
            return Err(InvalidBoundingBox {
                reason: "longitude must be within [-180, 180]",
            });
        }
        if self.min_lat >= self.max_lat || self.min_lng >= self.max_lng {
            return Err(InvalidBoundingBox {
                reason: "minimum must be below maximum",
            });
        }
        Ok(())
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.lat)
            && (self.min_lng..=self.max_lng).contains(&c.lng)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::PORTUGAL
    }
}
