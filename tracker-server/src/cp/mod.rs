//! CP (Comboios de Portugal) API client.
//!
//! Key characteristics of the upstream:
//! - Station ids look like `94-31039`; train numbers are plain integers
//! - Times are opaque display strings ("10:04"), never parsed here
//! - Coordinates arrive as strings or numbers and may be blank
//! - Train detail payloads carry more than we model; the raw JSON is kept

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod source;
mod types;

pub use client::{CpClient, CpConfig};
pub use error::CpError;
pub use source::{TrainSource, trains_at_station};
pub use types::{Designation, TrainDetail, TrainStop, TrainSummary};
