// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage points and their InfluxDB Line Protocol rendering.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```
//!
//! The timestamp unit is given by the write request's `precision` parameter,
//! so a point renders its timestamp in its own [`Precision`].
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: quoted with double quotes, inner quotes escaped (e.g., `"hello"`)
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }

    /// Float payload, if this is a float field.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if this is a string field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Timestamp precision of a write request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "u")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl Precision {
    /// Value of the `precision` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Nanoseconds => "ns",
            Precision::Microseconds => "u",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
            Precision::Minutes => "m",
            Precision::Hours => "h",
        }
    }

    /// Express `ts` as an integer count of this unit since the Unix epoch.
    ///
    /// Sub-unit remainders are truncated toward negative infinity.
    pub fn timestamp(&self, ts: &DateTime<Utc>) -> i64 {
        let secs = ts.timestamp();
        match self {
            Precision::Nanoseconds => ts
                .timestamp_nanos_opt()
                .unwrap_or_else(|| secs.saturating_mul(1_000_000_000)),
            Precision::Microseconds => ts.timestamp_micros(),
            Precision::Milliseconds => ts.timestamp_millis(),
            Precision::Seconds => secs,
            Precision::Minutes => secs.div_euclid(60),
            Precision::Hours => secs.div_euclid(3600),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement record submitted to the time-series backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoragePoint {
    /// Measurement name.
    pub measurement: String,
    /// Tag set (indexed, for filtering). Sorted by key.
    pub tags: BTreeMap<String, String>,
    /// Field set, in insertion order.
    pub fields: Vec<(String, FieldValue)>,
    /// Point time. `None` lets the backend assign its receive time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Unit of the rendered timestamp.
    pub precision: Precision,
    /// Retention policy the point is written under.
    pub retention_policy: String,
}

impl StoragePoint {
    /// Create a point with no tags or fields.
    pub fn new(
        measurement: impl Into<String>,
        precision: Precision,
        retention_policy: impl Into<String>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp: None,
            precision,
            retention_policy: retention_policy.into(),
        }
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Set the point time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Look up a field by key.
    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Render this point as one Line Protocol line.
    ///
    /// Returns `None` when the point has no fields (InfluxDB requires at
    /// least one).
    pub fn to_line_protocol(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');

        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        if let Some(ts) = &self.timestamp {
            line.push(' ');
            line.push_str(&self.precision.timestamp(ts).to_string());
        }

        Some(line)
    }
}

/// Escape measurement name for Line Protocol.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    single_line(s).replace(',', "\\,").replace(' ', "\\ ")
}

/// Escape tag keys, tag values and field keys.
/// Commas, equals signs, and spaces must be escaped.
fn escape_key(s: &str) -> String {
    single_line(s)
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Drop control characters (a newline ends the line) and trailing
/// backslashes (they would escape the following separator).
fn single_line(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim_end_matches('\\').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_field_value_formats() {
        assert_eq!(FieldValue::Float(3.15).to_line_protocol(), "3.15");
        assert_eq!(FieldValue::Float(87.0).to_line_protocol(), "87");
        assert_eq!(FieldValue::Integer(42).to_line_protocol(), "42i");
        assert_eq!(
            FieldValue::String("say \"hi\"".to_string()).to_line_protocol(),
            "\"say \\\"hi\\\"\""
        );
        assert_eq!(FieldValue::Boolean(false).to_line_protocol(), "false");
    }

    #[test]
    fn test_precision_timestamps() {
        let t = ts();
        assert_eq!(Precision::Seconds.timestamp(&t), 1_496_318_400);
        assert_eq!(Precision::Milliseconds.timestamp(&t), 1_496_318_400_000);
        assert_eq!(Precision::Minutes.timestamp(&t), 1_496_318_400 / 60);
        assert_eq!(Precision::Hours.timestamp(&t), 1_496_318_400 / 3600);
        assert_eq!(
            Precision::Nanoseconds.timestamp(&t),
            1_496_318_400_000_000_000
        );
    }

    #[test]
    fn test_precision_serde_names() {
        let p: Precision = serde_json::from_str("\"s\"").unwrap();
        assert_eq!(p, Precision::Seconds);
        assert_eq!(serde_json::to_string(&Precision::Microseconds).unwrap(), "\"u\"");
    }

    #[test]
    fn test_point_line_with_tags_and_timestamp() {
        let point = StoragePoint::new("location", Precision::Seconds, "location_2y")
            .tag("session_id", "abc123")
            .field("latitude", 47.5)
            .field("geohash", "c23nb62qp".to_string())
            .at(ts());

        assert_eq!(
            point.to_line_protocol().unwrap(),
            "location,session_id=abc123 latitude=47.5,geohash=\"c23nb62qp\" 1496318400"
        );
    }

    #[test]
    fn test_point_line_without_timestamp() {
        let point = StoragePoint::new("battery", Precision::Seconds, "autogen")
            .field("percentage", 87.0);
        assert_eq!(point.to_line_protocol().unwrap(), "battery percentage=87");
    }

    #[test]
    fn test_point_tags_sorted() {
        let point = StoragePoint::new("m", Precision::Seconds, "autogen")
            .tag("zone", "b")
            .tag("area", "a")
            .field("v", 1.0);
        assert_eq!(point.to_line_protocol().unwrap(), "m,area=a,zone=b v=1");
    }

    #[test]
    fn test_point_escapes_special_chars() {
        let point = StoragePoint::new("my measurement", Precision::Seconds, "autogen")
            .tag("tag key", "tag,value")
            .field("field=key", "hello \"world\"".to_string());
        assert_eq!(
            point.to_line_protocol().unwrap(),
            "my\\ measurement,tag\\ key=tag\\,value field\\=key=\"hello \\\"world\\\"\""
        );
    }

    #[test]
    fn test_point_identifiers_stay_on_one_line() {
        let point = StoragePoint::new("loc\nation", Precision::Seconds, "autogen")
            .tag("session_id", "abc\nevil pwned=1")
            .tag("trail", "abc\\")
            .field("v\r", 1.0);
        let line = point.to_line_protocol().unwrap();
        assert_eq!(
            line,
            "location,session_id=abcevil\\ pwned\\=1,trail=abc v=1"
        );
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn test_point_without_fields_has_no_line() {
        let point = StoragePoint::new("empty", Precision::Seconds, "autogen").tag("a", "b");
        assert!(point.to_line_protocol().is_none());
    }

    #[test]
    fn test_field_lookup() {
        let point = StoragePoint::new("m", Precision::Seconds, "autogen").field("speed", 3.2);
        assert_eq!(point.field_value("speed").and_then(FieldValue::as_f64), Some(3.2));
        assert!(point.field_value("missing").is_none());
    }
}
