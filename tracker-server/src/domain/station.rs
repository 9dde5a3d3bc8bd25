//! Station identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid CP station id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station id {input:?}: {reason}")]
pub struct InvalidStationId {
    input: String,
    reason: &'static str,
}

/// A CP station identifier such as `94-31039`.
///
/// Station ids are a numeric network prefix, a dash, and a numeric station
/// code. This type guarantees that any `StationId` value is well formed.
///
/// # Examples
///
/// ```
/// use tracker_server::domain::StationId;
///
/// let oriente = StationId::parse("94-31039").unwrap();
/// assert_eq!(oriente.as_str(), "94-31039");
///
/// assert!(StationId::parse("94").is_err());
/// assert!(StationId::parse("94-").is_err());
/// assert!(StationId::parse("ab-123").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    /// Parse a station id from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidStationId> {
        let invalid = |reason| InvalidStationId {
            input: s.to_string(),
            reason,
        };

        let (network, code) = s
            .split_once('-')
            .ok_or_else(|| invalid("missing '-' separator"))?;

        if network.is_empty() || code.is_empty() {
            return Err(invalid("both sides of '-' must be non-empty"));
        }

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(network) || !all_digits(code) {
            return Err(invalid("must contain only ASCII digits around '-'"));
        }

        Ok(StationId(s.to_string()))
    }

    /// Returns the station id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StationId {
    type Error = InvalidStationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StationId> for String {
    fn from(id: StationId) -> Self {
        id.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
