//! Station index and station views.
//!
//! Provides station name ↔ id mapping, fetched once from the CP API at
//! startup, and the station lists shown alongside trains on the map.

mod index;
mod view;

pub use index::{StationIndex, StationRecord};
pub use view::{
    MajorStation, StationKind, StationView, StationViews, TRAINS_PER_STATION, TrainBrief,
    default_major_stations, title_case,
};
