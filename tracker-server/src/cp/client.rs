//! CP "spring" API HTTP client.
//!
//! Three endpoints are used: the station index (name → id), the trains
//! currently listed at a station, and the live detail of one train.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{StationId, TrainNumber};

use super::error::CpError;
use super::types::{TrainDetail, TrainSummary};

/// Default base URL for the CP API.
const DEFAULT_BASE_URL: &str = "https://www.cp.pt/sites/spring";

/// How much of an unparsable body to keep in errors.
const BODY_SNIPPET_CHARS: usize = 500;

/// Configuration for the CP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Timeout for station-trains and train-detail requests, in seconds
    pub timeout_secs: u64,
    /// Timeout for the one-off station index request, in seconds
    pub index_timeout_secs: u64,
}

impl CpConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            index_timeout_secs: 15,
        }
    }
}

/// CP API client.
#[derive(Debug, Clone)]
pub struct CpClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    index_timeout: Duration,
}

impl CpClient {
    /// Create a new CP client with the given configuration.
    pub fn new(config: &CpConfig) -> Result<Self, CpError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tracker-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            index_timeout: config.index_timeout(),
        })
    }

    /// Fetch the station index: upper-case station name → station id.
    pub async fn fetch_station_index(&self) -> Result<HashMap<String, String>, CpError> {
        let url = format!("{}/station-index", self.base_url);
        let body = self.get_json(&url, &[], self.index_timeout).await?;

        serde_json::from_value(body).map_err(|e| CpError::Json {
            message: e.to_string(),
            body: None,
        })
    }

    /// Fetch the trains currently listed at a station.
    ///
    /// Individual entries that do not decode are skipped rather than failing
    /// the whole listing.
    pub async fn fetch_station_trains(
        &self,
        station: &StationId,
    ) -> Result<Vec<TrainSummary>, CpError> {
        let url = format!("{}/station/trains", self.base_url);
        let body = self
            .get_json(&url, &[("stationId", station.as_str())], self.timeout)
            .await?;

        let entries = match body {
            Value::Null => return Ok(Vec::new()),
            Value::Array(entries) => entries,
            other => {
                return Err(CpError::Json {
                    message: "expected an array of trains".to_string(),
                    body: Some(snippet(&other.to_string())),
                });
            }
        };

        let total = entries.len();
        let summaries: Vec<TrainSummary> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(station = %station, error = %e, "Skipping malformed train entry");
                    None
                }
            })
            .collect();

        debug!(station = %station, total, kept = summaries.len(), "Fetched station trains");
        Ok(summaries)
    }

    /// Fetch the live detail of one train.
    pub async fn fetch_train_detail(&self, train: &TrainNumber) -> Result<TrainDetail, CpError> {
        let url = format!("{}/station/trains/train", self.base_url);
        let body = self
            .get_json(&url, &[("trainId", train.as_str())], self.timeout)
            .await?;

        if body.is_null() {
            return Err(CpError::NotFound);
        }

        TrainDetail::from_json(body).map_err(|e| CpError::Json {
            message: e.to_string(),
            body: None,
        })
    }

    /// GET a URL and decode the body as JSON.
    ///
    /// An empty body decodes as `Value::Null`.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, CpError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CpError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CpError::Api {
                status: status.as_u16(),
                message: snippet(&body),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| CpError::Json {
            message: e.to_string(),
            body: Some(snippet(&body)),
        })
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = CpConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.index_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn config_builder() {
        let config = CpConfig::default()
            .with_base_url("http://localhost:8080/")
            .with_timeout(3);
        assert_eq!(config.base_url, "http://localhost:8080/");
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn client_strips_trailing_slash() {
        let config = CpConfig::default().with_base_url("http://localhost:8080/");
        let client = CpClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn snippet_truncates() {
        let long = "x".repeat(2 * BODY_SNIPPET_CHARS);
        assert_eq!(snippet(&long).len(), BODY_SNIPPET_CHARS);
    }

    // Requests against the live CP API are not exercised here; the pipeline
    // is tested against `MockSource` instead.
}
