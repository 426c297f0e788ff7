// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event payload parsing and point derivation.
//!
//! ```text
//! RawEvent --classify--> EventKind --parse--> Record --derive--> Vec<StoragePoint>
//! ```
//!
//! [`Transformer::transform`] never fails: a payload that cannot be used is
//! logged and produces no points, so one bad event cannot stop the stream.

use crate::config::TransformConfig;
use crate::event::{EventKind, RawEvent};
use crate::geohash::{self, GeohashError};
use crate::point::StoragePoint;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Measurement written for battery readings.
pub const BATTERY_MEASUREMENT: &str = "battery";

/// Measurement written for position fixes.
pub const LOCATION_MEASUREMENT: &str = "location";

// Location payload keys, as published by the tracker firmware.
const KEY_SESSION: &str = "s_id";
const KEY_LAT: &str = "lat";
const KEY_LON: &str = "lon";
const KEY_ALT: &str = "alt";
const KEY_SPEED: &str = "spd";
const KEY_PERCENTAGE: &str = "percentage";

/// Reasons a payload cannot be turned into a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPayload {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("field `{0}` contains control characters or ends with a backslash")]
    UnsafeValue(&'static str),

    #[error("field `{field}` is not a finite number: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl MalformedPayload {
    /// Name of the offending payload field, if the error concerns one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            MalformedPayload::MissingField(f)
            | MalformedPayload::EmptyField(f)
            | MalformedPayload::UnsafeValue(f) => Some(*f),
            MalformedPayload::NotNumeric { field, .. } => Some(*field),
            MalformedPayload::InvalidJson(_) => None,
        }
    }
}

/// Per-event transform failures. Both are recovered by dropping the event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] MalformedPayload),

    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeohashError),
}

/// Parsed battery reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryRecord {
    /// Charge, in percent.
    pub percentage: f64,
}

impl BatteryRecord {
    /// Parse a battery payload.
    ///
    /// Accepts a bare number (`"87"`, `" 87.5 "`) or a JSON object carrying a
    /// `percentage` key.
    pub fn parse(data: &str) -> Result<Self, MalformedPayload> {
        let trimmed = data.trim();
        if trimmed.starts_with('{') {
            let obj = parse_object(trimmed)?;
            let percentage = number(&obj, KEY_PERCENTAGE)?;
            return Ok(Self { percentage });
        }

        let percentage = parse_finite(trimmed).ok_or_else(|| MalformedPayload::NotNumeric {
            field: KEY_PERCENTAGE,
            value: trimmed.to_string(),
        })?;
        Ok(Self { percentage })
    }
}

/// Parsed GNSS position fix.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub session_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub speed_mph: f64,
}

impl LocationRecord {
    /// Parse a location payload: a JSON object with `s_id`, `lat`, `lon`,
    /// `alt` and `spd`. Numbers may also arrive as numeric strings.
    ///
    /// Coordinate ranges are checked when the fix is geocoded.
    pub fn parse(data: &str) -> Result<Self, MalformedPayload> {
        let obj = parse_object(data)?;
        Ok(Self {
            session_id: session_id(&obj)?,
            latitude: number(&obj, KEY_LAT)?,
            longitude: number(&obj, KEY_LON)?,
            elevation: number(&obj, KEY_ALT)?,
            speed_mph: number(&obj, KEY_SPEED)?,
        })
    }
}

/// Converts raw events into storage points.
#[derive(Debug, Clone)]
pub struct Transformer {
    config: TransformConfig,
}

impl Transformer {
    /// Create a transformer.
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Get the transform configuration.
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transform one event into zero or more points.
    ///
    /// Unknown events and unusable payloads yield an empty vector; the reason
    /// is logged.
    pub fn transform(&self, event: &RawEvent) -> Vec<StoragePoint> {
        match self.try_transform(event) {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(
                    "Dropping {} event from {}: {}",
                    event.name,
                    event.source(),
                    err
                );
                Vec::new()
            }
        }
    }

    /// Transform one event, surfacing the failure reason.
    pub fn try_transform(&self, event: &RawEvent) -> Result<Vec<StoragePoint>, TransformError> {
        match event.kind() {
            EventKind::Battery => {
                let record = BatteryRecord::parse(&event.data)?;
                tracing::info!("Battery charge: {}%", record.percentage);
                Ok(vec![self.battery_point(&record, event.published_at)])
            }
            EventKind::Location => {
                let record = LocationRecord::parse(&event.data)?;
                let point = self.location_point(&record, event.published_at)?;
                tracing::info!(
                    "Location at {}: {}",
                    event.published_at,
                    point
                        .field_value("geohash")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                );
                Ok(vec![point])
            }
            EventKind::Unknown(name) => {
                tracing::info!("{} : {} (from {})", name, event.data, event.source());
                Ok(Vec::new())
            }
        }
    }

    fn battery_point(&self, record: &BatteryRecord, at: DateTime<Utc>) -> StoragePoint {
        StoragePoint::new(
            BATTERY_MEASUREMENT,
            self.config.precision,
            self.config.retention_policy.as_str(),
        )
        .field("percentage", record.percentage)
        .at(at)
    }

    fn location_point(
        &self,
        record: &LocationRecord,
        at: DateTime<Utc>,
    ) -> Result<StoragePoint, GeohashError> {
        let hash = geohash::encode(
            record.latitude,
            record.longitude,
            self.config.geohash_precision,
        )?;

        Ok(StoragePoint::new(
            LOCATION_MEASUREMENT,
            self.config.precision,
            self.config.retention_policy.as_str(),
        )
        .tag("session_id", record.session_id.as_str())
        .field("latitude", record.latitude)
        .field("longitude", record.longitude)
        .field("geohash", hash)
        .field("elevation", record.elevation)
        .field("speed", record.speed_mph)
        .at(at))
    }
}

fn parse_object(data: &str) -> Result<Map<String, Value>, MalformedPayload> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(MalformedPayload::InvalidJson(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(MalformedPayload::InvalidJson(e.to_string())),
    }
}

/// Read a finite number that may be encoded as a JSON number or a string.
fn number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, MalformedPayload> {
    let not_numeric = |value: String| MalformedPayload::NotNumeric { field, value };
    match obj.get(field) {
        None | Some(Value::Null) => Err(MalformedPayload::MissingField(field)),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| not_numeric(n.to_string())),
        Some(Value::String(s)) => parse_finite(s.trim()).ok_or_else(|| not_numeric(s.clone())),
        Some(other) => Err(not_numeric(other.to_string())),
    }
}

fn session_id(obj: &Map<String, Value>) -> Result<String, MalformedPayload> {
    let id = match obj.get(KEY_SESSION) {
        None | Some(Value::Null) => return Err(MalformedPayload::MissingField(KEY_SESSION)),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(MalformedPayload::InvalidJson(format!(
                "`{}` must be a string or number, got {}",
                KEY_SESSION, other
            )))
        }
    };
    if id.is_empty() {
        return Err(MalformedPayload::EmptyField(KEY_SESSION));
    }
    // Becomes a tag value: must stay on one Line Protocol line
    if id.chars().any(char::is_control) || id.ends_with('\\') {
        return Err(MalformedPayload::UnsafeValue(KEY_SESSION));
    }
    Ok(id)
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
