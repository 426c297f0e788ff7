// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay configuration.
//!
//! Loaded once from a TOML file at startup:
//!
//! ```toml
//! [particle]
//! username = "particle_username"
//! password = "particle_password"
//! device_id = "electron_device_name"
//! event_filter = "event"   # "event" captures all events
//!
//! [influxdb]
//! url = "http://localhost:8086"
//! database = "Tracking"
//!
//! [transform]
//! geohash_precision = 9
//! retention_policy = "location_2y"
//! precision = "s"
//! ```

use crate::cloud::{Credentials, EventFilter};
use crate::geohash::MAX_PRECISION;
use crate::point::Precision;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Device cloud account and subscription.
    pub particle: ParticleConfig,

    /// Storage backend connection.
    pub influxdb: InfluxDbConfig,

    /// Point derivation settings.
    #[serde(default)]
    pub transform: TransformConfig,

    /// Process settings.
    #[serde(default)]
    pub relay: RuntimeConfig,
}

/// Particle device cloud settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// API base URL.
    #[serde(default = "default_particle_api")]
    pub api_url: String,

    /// Account username (e-mail).
    pub username: String,

    /// Account password.
    pub password: String,

    /// Device name or id to subscribe to (`mine` for every owned device).
    pub device_id: String,

    /// Event name prefix; `event` or empty subscribes to all events.
    #[serde(default = "default_event_filter")]
    pub event_filter: String,
}

impl ParticleConfig {
    /// Login credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Parsed event filter.
    pub fn event_filter(&self) -> EventFilter {
        EventFilter::parse(&self.event_filter)
    }
}

/// InfluxDB 1.x connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    /// Server URL (e.g., "http://localhost:8086").
    pub url: String,

    /// Target database.
    pub database: String,

    /// Username, if authentication is enabled.
    #[serde(default)]
    pub username: Option<String>,

    /// Password, if authentication is enabled.
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Point derivation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Geohash length for location points.
    #[serde(default = "default_geohash_precision")]
    pub geohash_precision: usize,

    /// Retention policy every point is written under.
    #[serde(default = "default_retention_policy")]
    pub retention_policy: String,

    /// Timestamp precision of written points.
    #[serde(default)]
    pub precision: Precision,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            geohash_precision: default_geohash_precision(),
            retention_policy: default_retention_policy(),
            precision: Precision::Seconds,
        }
    }
}

/// Process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Statistics reporting interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
        }
    }
}

fn default_particle_api() -> String {
    "https://api.particle.io".to_string()
}

fn default_event_filter() -> String {
    "event".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_geohash_precision() -> usize {
    9
}

fn default_retention_policy() -> String {
    "location_2y".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Placeholder configuration, used by `gen-config`.
    pub fn example() -> Self {
        Self {
            particle: ParticleConfig {
                api_url: default_particle_api(),
                username: "particle_username".into(),
                password: "particle_password".into(),
                device_id: "electron_device_name".into(),
                event_filter: default_event_filter(),
            },
            influxdb: InfluxDbConfig {
                url: "http://localhost:8086".into(),
                database: "Tracking".into(),
                username: Some("influxdb_username".into()),
                password: Some("influxdb_password".into()),
                timeout_secs: default_timeout_secs(),
            },
            transform: TransformConfig::default(),
            relay: RuntimeConfig::default(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.particle;
        require_http_url("particle.api_url", &p.api_url)?;
        require_non_empty("particle.username", &p.username)?;
        require_non_empty("particle.password", &p.password)?;
        require_non_empty("particle.device_id", &p.device_id)?;

        let db = &self.influxdb;
        require_http_url("influxdb.url", &db.url)?;
        require_non_empty("influxdb.database", &db.database)?;
        if db.username.is_some() != db.password.is_some() {
            return Err(ConfigError::Invalid(
                "influxdb.username and influxdb.password must be set together".into(),
            ));
        }
        if db.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "influxdb.timeout_secs must be positive".into(),
            ));
        }

        let t = &self.transform;
        if t.geohash_precision == 0 || t.geohash_precision > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "transform.geohash_precision must be in 1..={}, got {}",
                MAX_PRECISION, t.geohash_precision
            )));
        }
        require_non_empty("transform.retention_policy", &t.retention_policy)?;

        Ok(())
    }
}

fn require_non_empty(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
    }
    Ok(())
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "{} must be an http(s) URL, got {:?}",
            key, value
        )));
    }
    Ok(())
}
