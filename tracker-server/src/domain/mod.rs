//! Domain value types for the tracker.
//!
//! These types enforce their invariants at construction time, so code that
//! receives them can trust their validity.

mod geo;
mod station;
mod train;

pub use geo::{BoundingBox, Coordinate, InvalidBoundingBox, parse_degrees};
pub use station::{InvalidStationId, StationId};
pub use train::TrainNumber;
