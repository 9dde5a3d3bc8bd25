//! The upstream data-source seam.

use std::collections::HashMap;
use std::future::Future;

use tracing::warn;

use crate::domain::{StationId, TrainNumber};

use super::client::CpClient;
use super::error::CpError;
use super::types::{TrainDetail, TrainSummary};

/// Trait for providing station and train data.
///
/// This abstraction allows the pipeline and service to be tested with mock
/// data instead of the live CP API.
pub trait TrainSource: Send + Sync {
    /// Upper-case station name → raw station id.
    fn station_index(&self)
    -> impl Future<Output = Result<HashMap<String, String>, CpError>> + Send;

    /// Trains currently listed at `station`.
    fn station_trains(
        &self,
        station: &StationId,
    ) -> impl Future<Output = Result<Vec<TrainSummary>, CpError>> + Send;

    /// Live detail of one train.
    fn train_detail(
        &self,
        train: &TrainNumber,
    ) -> impl Future<Output = Result<TrainDetail, CpError>> + Send;
}

impl TrainSource for CpClient {
    async fn station_index(&self) -> Result<HashMap<String, String>, CpError> {
        self.fetch_station_index().await
    }

    async fn station_trains(&self, station: &StationId) -> Result<Vec<TrainSummary>, CpError> {
        self.fetch_station_trains(station).await
    }

    async fn train_detail(&self, train: &TrainNumber) -> Result<TrainDetail, CpError> {
        self.fetch_train_detail(train).await
    }
}

/// Fetch the trains listed at one station.
///
/// Never fails: any upstream error is logged and reported as an empty
/// listing. The next poll cycle is the retry.
pub async fn trains_at_station<S: TrainSource>(source: &S, station: &StationId) -> Vec<TrainSummary> {
    match source.station_trains(station).await {
        Ok(trains) => trains,
        Err(e) => {
            warn!(station = %station, error = %e, "Failed to fetch trains for station");
            Vec::new()
        }
    }
}
