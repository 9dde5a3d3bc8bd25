//! Tracker configuration.
//!
//! Every section has defaults matching the Portuguese deployment, so an
//! empty (or absent) config file is valid. A YAML file can override any
//! subset:
//!
//! ```yaml
//! bounding_box: { min_lat: 36.0, max_lat: 42.5, min_lng: -10.0, max_lng: -6.0 }
//! major_stations:
//!   - id: "94-31039"
//!     coordinates: { lat: 38.7681, lng: -9.0978 }
//! poll: { interval_secs: 10, backoff_secs: 30, max_concurrent_requests: 8 }
//! cache: { ttl_secs: 300, evict_after_secs: 600, max_entries: 1000 }
//! server: { bind: "127.0.0.1:3000" }
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::cp::CpConfig;
use crate::domain::{BoundingBox, StationId};
use crate::service::PollConfig;
use crate::stations::{MajorStation, default_major_stations};

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_VAR: &str = "TRACKER_CONFIG";

/// Environment variable overriding the HTTP bind address.
pub const BIND_VAR: &str = "TRACKER_BIND";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Upstream CP API settings
    pub api: CpConfig,
    /// Positions outside this box are discarded
    pub bounding_box: BoundingBox,
    /// Stations polled every cycle
    pub major_stations: Vec<MajorStation>,
    /// Poll cadence and fan-out width
    pub poll: PollConfig,
    /// Train detail cache sizing
    pub cache: CacheConfig,
    /// HTTP read surface
    pub server: ServerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api: CpConfig::default(),
            bounding_box: BoundingBox::PORTUGAL,
            major_stations: default_major_stations(),
            poll: PollConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl TrackerConfig {
    /// Load and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `TRACKER_CONFIG`, or use defaults.
    /// `TRACKER_BIND` overrides the bind address either way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(bind) = std::env::var(BIND_VAR) {
            config.server.bind = bind
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{BIND_VAR}={bind} is not host:port")))?;
        }

        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounding_box
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.major_stations.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one major station is required".to_string(),
            ));
        }
        if self.poll.interval_secs == 0 || self.poll.backoff_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be positive".to_string(),
            ));
        }
        if self.poll.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_requests must be positive".to_string(),
            ));
        }
        if self.cache.evict_after_secs < self.cache.ttl_secs {
            return Err(ConfigError::Invalid(
                "cache evict_after_secs must not be below ttl_secs".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 || self.api.index_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Ids of the stations polled each cycle, in configured order.
    pub fn station_ids(&self) -> Vec<StationId> {
        self.major_stations.iter().map(|m| m.id.clone()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
