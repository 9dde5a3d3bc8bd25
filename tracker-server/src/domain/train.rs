//! Train number type.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A train number as reported by the CP API, e.g. `"123"` or `"4410"`.
///
/// The upstream sends train numbers as JSON numbers in station listings and
/// accepts them as strings in detail requests, so the canonical form is the
/// decimal string. Train numbers identify a train within a snapshot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrainNumber(String);

impl TrainNumber {
    /// Build a train number from a string, rejecting blank input.
    pub fn new(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(TrainNumber(trimmed.to_string()))
        }
    }

    /// Build a train number from a raw JSON value.
    ///
    /// Accepts non-negative integers and non-blank strings. Anything else
    /// (null, floats, objects) yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(|n| TrainNumber(n.to_string())),
            Value::String(s) => Self::new(s),
            _ => None,
        }
    }

    /// Returns the train number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainNumber({})", self.0)
    }
}

impl fmt::Display for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
