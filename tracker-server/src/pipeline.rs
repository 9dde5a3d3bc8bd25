//! Fetch-and-merge pipeline: one poll cycle.
//!
//! A cycle runs two bounded fan-out/fan-in phases. First every major station
//! is asked which trains it lists; the listings are merged and deduplicated by
//! train number. Then each unique train's live detail is looked up through
//! the [`DetailCache`]. Trains whose reported position lies inside the
//! bounding box are assembled into [`EnrichedTrain`]s and the whole mapping is
//! published at once.
//!
//! Failures of individual stations or trains only shrink the result; they
//! never abort the cycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, trace};

use crate::cache::{Clock, DetailCache, SystemClock};
use crate::cp::{TrainSource, TrainSummary, trains_at_station};
use crate::domain::{BoundingBox, StationId, TrainNumber};
use crate::enrich::assemble;
use crate::snapshot::{SnapshotStore, TrainMap};

/// Default number of requests in flight per phase.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Errors that abort a whole cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Nothing to poll
    #[error("no stations configured to poll")]
    NoStations,
}

/// Counters describing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stations_polled: usize,
    /// Listing entries across all stations, duplicates included.
    pub summaries: usize,
    /// Distinct train numbers detail-fetched.
    pub unique_trains: usize,
    /// Trains whose detail could not be fetched.
    pub detail_failures: usize,
    /// Trains dropped for missing or out-of-bounds coordinates.
    pub rejected: usize,
    /// Trains in the published snapshot.
    pub published: usize,
}

/// A train seen in some station listing, before its detail is known.
struct Discovered {
    number: TrainNumber,
    summary: TrainSummary,
    source_station: StationId,
}

/// Orchestrates one poll cycle against a [`TrainSource`].
pub struct Pipeline<S, C = SystemClock> {
    source: Arc<S>,
    cache: Arc<DetailCache<C>>,
    stations: Vec<StationId>,
    bounding_box: BoundingBox,
    max_concurrent: usize,
}

impl<S: TrainSource + 'static, C: Clock + 'static> Pipeline<S, C> {
    /// Create a pipeline polling `stations` and keeping trains inside `bounding_box`.
    pub fn new(
        source: Arc<S>,
        cache: DetailCache<C>,
        stations: Vec<StationId>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            source,
            cache: Arc::new(cache),
            stations,
            bounding_box,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Set the number of requests in flight per phase (at least 1).
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    pub fn cache(&self) -> &DetailCache<C> {
        &self.cache
    }

    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    /// Run one cycle and publish its result to `store`.
    ///
    /// On error nothing is published and the previous snapshot stays visible.
    pub async fn run_cycle(&self, store: &SnapshotStore) -> Result<CycleReport, PipelineError> {
        let (trains, report) = self.collect().await?;
        let snapshot = store.publish(trains);

        info!(
            version = snapshot.version,
            stations = report.stations_polled,
            summaries = report.summaries,
            unique = report.unique_trains,
            rejected = report.rejected,
            failed = report.detail_failures,
            published = report.published,
            "Published train snapshot"
        );
        Ok(report)
    }

    /// Run one cycle without publishing.
    pub async fn collect(&self) -> Result<(TrainMap, CycleReport), PipelineError> {
        if self.stations.is_empty() {
            return Err(PipelineError::NoStations);
        }

        let mut report = CycleReport {
            stations_polled: self.stations.len(),
            ..CycleReport::default()
        };

        let discovered = self.discover(&mut report).await;
        report.unique_trains = discovered.len();

        // Phase 2: one detail lookup per unique train, completion order.
        let details: Vec<_> = stream::iter(discovered)
            .map(|found| {
                let source = Arc::clone(&self.source);
                let cache = Arc::clone(&self.cache);
                async move {
                    let detail = cache.get_or_fetch(source.as_ref(), &found.number).await;
                    (found, detail)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let now = Utc::now();
        let mut trains = TrainMap::with_capacity(details.len());

        for (found, detail) in details {
            let Some(detail) = detail else {
                report.detail_failures += 1;
                continue;
            };

            let Some(position) = detail
                .position()
                .filter(|p| self.bounding_box.contains(*p))
            else {
                trace!(train = %found.number, lat = ?detail.latitude, lng = ?detail.longitude, "Dropping train without usable position");
                report.rejected += 1;
                continue;
            };

            let train = assemble(
                found.number,
                &found.summary,
                found.source_station,
                &detail,
                position,
                now,
            );
            trains.insert(train.train_id.clone(), train);
        }

        report.published = trains.len();
        Ok((trains, report))
    }

    /// Phase 1: poll every station and keep the first listing of each train.
    async fn discover(&self, report: &mut CycleReport) -> Vec<Discovered> {
        // `buffered` keeps station order, so "first" means first in the
        // configured station list regardless of which response lands first.
        let listings: Vec<(StationId, Vec<TrainSummary>)> = stream::iter(self.stations.clone())
            .map(|station| {
                let source = Arc::clone(&self.source);
                async move {
                    let trains = trains_at_station(source.as_ref(), &station).await;
                    (station, trains)
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut discovered = Vec::new();

        for (station, summaries) in listings {
            report.summaries += summaries.len();
            for summary in summaries {
                let Some(number) = summary.number() else {
                    debug!(station = %station, "Skipping listing entry without train number");
                    continue;
                };
                if seen.insert(number.clone()) {
                    discovered.push(Discovered {
                        number,
                        summary,
                        source_station: station.clone(),
                    });
                }
            }
        }

        discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::cp::mock::{MockSource, detail_at, detail_with_stops, summary};
    use std::time::Duration;

    fn station(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    fn pipeline(source: &Arc<MockSource>, stations: &[&str]) -> Pipeline<MockSource> {
        Pipeline::new(
            Arc::clone(source),
            DetailCache::new(CacheConfig::default()),
            stations.iter().map(|s| station(s)).collect(),
            BoundingBox::PORTUGAL,
        )
    }

    #[tokio::test]
    async fn keeps_only_trains_inside_bounding_box() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(123), summary(456)])
                .with_detail(123, detail_at(38.7681, -9.0978))
                .with_detail(456, detail_at(40.4168, -3.7038)),
        );
        let store = SnapshotStore::new();

        let report = pipeline(&source, &["94-31039"])
            .run_cycle(&store)
            .await
            .unwrap();

        let snap = store.read();
        assert_eq!(snap.len(), 1);
        assert!(snap.get("123").is_some());
        assert!(snap.get("456").is_none());
        assert_eq!(report.rejected, 1);
        assert_eq!(report.published, 1);
    }

    #[tokio::test]
    async fn duplicate_listings_fetch_detail_once() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(123), summary(123)])
                .with_station("94-2006", vec![summary(123), summary(777)])
                .with_station("94-73007", vec![summary(123)])
                .with_detail(123, detail_at(38.7, -9.1))
                .with_detail(777, detail_at(41.1, -8.6)),
        );
        let p = pipeline(&source, &["94-31039", "94-2006", "94-73007"]);
        let (trains, report) = p.collect().await.unwrap();

        assert_eq!(source.detail_calls(123), 1);
        assert_eq!(source.detail_calls(777), 1);
        assert_eq!(report.summaries, 5);
        assert_eq!(report.unique_trains, 2);
        assert_eq!(trains.len(), 2);
    }

    #[tokio::test]
    async fn first_station_in_list_wins() {
        let mut late = summary(123);
        late.platform = Some("9".to_string());

        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(123)])
                .with_station("94-2006", vec![late])
                .with_detail(123, detail_at(38.7, -9.1)),
        );
        // Both listings are in flight at once; order must still hold.
        source.set_latency(Duration::from_millis(5));

        let (trains, _) = pipeline(&source, &["94-31039", "94-2006"])
            .collect()
            .await
            .unwrap();

        let train = &trains["123"];
        assert_eq!(train.source_station, station("94-31039"));
        assert_eq!(train.platform.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn failing_station_does_not_abort_cycle() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1)])
                .with_station("94-2006", vec![summary(2)])
                .with_detail(1, detail_at(38.7, -9.1))
                .with_detail(2, detail_at(41.1, -8.6)),
        );
        source.fail_station("94-2006");

        let (trains, report) = pipeline(&source, &["94-31039", "94-2006"])
            .collect()
            .await
            .unwrap();

        assert_eq!(trains.len(), 1);
        assert_eq!(report.stations_polled, 2);
    }

    #[tokio::test]
    async fn failing_detail_only_drops_that_train() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1), summary(2)])
                .with_detail(1, detail_at(38.7, -9.1))
                .with_detail(2, detail_at(38.8, -9.2)),
        );
        source.fail_train(2);

        let (trains, report) = pipeline(&source, &["94-31039"]).collect().await.unwrap();
        assert_eq!(trains.len(), 1);
        assert_eq!(report.detail_failures, 1);
    }

    #[tokio::test]
    async fn missing_or_garbage_coordinates_are_rejected() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1), summary(2), summary(3)])
                .with_detail(1, crate::cp::TrainDetail::default())
                .with_detail(
                    2,
                    crate::cp::TrainDetail::from_json(
                        serde_json::json!({"latitude": "n/a", "longitude": "-9.1"}),
                    )
                    .unwrap(),
                )
                .with_detail(3, detail_at(38.7, -9.1)),
        );

        let (trains, report) = pipeline(&source, &["94-31039"]).collect().await.unwrap();
        assert_eq!(trains.len(), 1);
        assert_eq!(report.rejected, 2);
    }

    #[tokio::test]
    async fn entries_without_train_number_are_skipped() {
        let no_number: TrainSummary =
            serde_json::from_value(serde_json::json!({"platform": "2"})).unwrap();
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![no_number, summary(1)])
                .with_detail(1, detail_at(38.7, -9.1)),
        );

        let (trains, report) = pipeline(&source, &["94-31039"]).collect().await.unwrap();
        assert_eq!(report.summaries, 2);
        assert_eq!(report.unique_trains, 1);
        assert_eq!(trains.len(), 1);
    }

    #[tokio::test]
    async fn route_comes_from_detail_stops() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1)])
                .with_detail(
                    1,
                    detail_with_stops(
                        39.0,
                        -8.9,
                        &[
                            ("94-31039", "LISBOA - ORIENTE", 38.7681, -9.0978),
                            ("94-36004", "COIMBRA-B", 40.2033, -8.4103),
                        ],
                    ),
                ),
        );

        let (trains, _) = pipeline(&source, &["94-31039"]).collect().await.unwrap();
        assert_eq!(trains["1"].route, vec![[-9.0978, 38.7681], [-8.4103, 40.2033]]);
    }

    #[tokio::test]
    async fn malformed_stop_keeps_the_train() {
        let detail = crate::cp::TrainDetail::from_json(serde_json::json!({
            "latitude": "38.7",
            "longitude": "-9.1",
            "trainStops": [
                {"designation": 42, "latitude": "38.76", "longitude": "-9.09"},
                {"station": "LISBOA", "latitude": "", "longitude": "-9.10"}
            ]
        }))
        .unwrap();
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1)])
                .with_detail(1, detail),
        );

        let (trains, report) = pipeline(&source, &["94-31039"]).collect().await.unwrap();
        assert_eq!(report.detail_failures, 0);
        assert_eq!(trains.len(), 1);
        assert_eq!(trains["1"].route, vec![[-9.09, 38.76]]);
    }

    #[tokio::test]
    async fn no_stations_is_a_cycle_error_and_keeps_snapshot() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1)])
                .with_detail(1, detail_at(38.7, -9.1)),
        );
        let store = SnapshotStore::new();
        pipeline(&source, &["94-31039"])
            .run_cycle(&store)
            .await
            .unwrap();

        let err = pipeline(&source, &[]).run_cycle(&store).await.unwrap_err();
        assert_eq!(err, PipelineError::NoStations);
        assert_eq!(store.read().len(), 1);
        assert_eq!(store.read().version, 1);
    }

    #[tokio::test]
    async fn empty_world_still_publishes() {
        let source = Arc::new(MockSource::new().with_station("94-31039", vec![]));
        let store = SnapshotStore::new();

        let report = pipeline(&source, &["94-31039"])
            .run_cycle(&store)
            .await
            .unwrap();
        assert_eq!(report.published, 0);
        assert_eq!(store.read().version, 1);
    }

    #[tokio::test]
    async fn second_cycle_within_ttl_uses_cache() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1), summary(2)])
                .with_detail(1, detail_at(38.7, -9.1))
                .with_detail(2, detail_at(38.8, -9.2)),
        );
        let store = SnapshotStore::new();
        let p = pipeline(&source, &["94-31039"]);

        p.run_cycle(&store).await.unwrap();
        p.run_cycle(&store).await.unwrap();

        assert_eq!(source.station_calls(), 2);
        assert_eq!(source.total_detail_calls(), 2);
        assert_eq!(p.cache().len(), 2);
    }

    #[tokio::test]
    async fn station_requests_stay_within_width() {
        let ids: Vec<String> = (1..=10).map(|n| format!("94-{n}")).collect();
        let mut source = MockSource::new();
        for id in &ids {
            source = source.with_station(id, vec![]);
        }
        let source = Arc::new(source);
        source.set_latency(Duration::from_millis(20));

        let stations: Vec<&str> = ids.iter().map(String::as_str).collect();
        pipeline(&source, &stations)
            .with_max_concurrent(3)
            .collect()
            .await
            .unwrap();

        assert_eq!(source.station_calls(), 10);
        assert!(source.peak_station_requests() <= 3);
        assert!(source.peak_station_requests() > 1);
    }

    #[tokio::test]
    async fn detail_requests_stay_within_width() {
        let mut source = MockSource::new();
        for n in 0..20 {
            source = source.with_detail(n, detail_at(38.7, -9.1));
        }
        let source = Arc::new(source.with_station("94-31039", (0..20).map(summary).collect()));
        source.set_latency(Duration::from_millis(20));

        let (trains, _) = pipeline(&source, &["94-31039"])
            .with_max_concurrent(3)
            .collect()
            .await
            .unwrap();

        assert_eq!(trains.len(), 20);
        assert_eq!(source.total_detail_calls(), 20);
        assert!(source.peak_detail_requests() <= 3);
        assert!(source.peak_detail_requests() > 1);
    }

    #[tokio::test]
    async fn concurrency_width_is_clamped() {
        let source = Arc::new(
            MockSource::new()
                .with_station("94-31039", vec![summary(1)])
                .with_detail(1, detail_at(38.7, -9.1)),
        );
        let p = pipeline(&source, &["94-31039"]).with_max_concurrent(0);
        let (trains, _) = p.collect().await.unwrap();
        assert_eq!(trains.len(), 1);
    }
}
