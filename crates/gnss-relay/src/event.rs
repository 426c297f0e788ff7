// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw device events and their classification.

use chrono::{DateTime, Utc};
use std::fmt;

/// Event name published by the tracker for battery charge readings.
pub const BATTERY_EVENT: &str = "GNSS/Bat";

/// Event name published by the tracker for position fixes.
pub const LOCATION_EVENT: &str = "GNSS/data";

/// One occurrence delivered by the device-cloud event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Event name as published by the device.
    pub name: String,
    /// Opaque payload string.
    pub data: String,
    /// Time the device cloud accepted the event.
    pub published_at: DateTime<Utc>,
    /// Publishing device, when the transport reports it.
    pub device_id: Option<String>,
}

impl RawEvent {
    /// Create an event without a device id.
    pub fn new(
        name: impl Into<String>,
        data: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            published_at,
            device_id: None,
        }
    }

    /// Classify this event by name.
    pub fn kind(&self) -> EventKind<'_> {
        EventKind::classify(&self.name)
    }

    /// Publishing device for log lines, `-` when unknown.
    pub fn source(&self) -> &str {
        self.device_id.as_deref().unwrap_or("-")
    }
}

/// Known event kinds, plus a catch-all for names this relay does not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    /// Battery percentage (`GNSS/Bat`).
    Battery,
    /// GNSS position fix (`GNSS/data`).
    Location,
    /// Any other event name.
    Unknown(&'a str),
}

impl<'a> EventKind<'a> {
    /// Map an event name to its kind. Matching is exact and case-sensitive.
    pub fn classify(name: &'a str) -> Self {
        match name {
            BATTERY_EVENT => EventKind::Battery,
            LOCATION_EVENT => EventKind::Location,
            other => EventKind::Unknown(other),
        }
    }
}

impl fmt::Display for EventKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Battery => f.write_str("battery"),
            EventKind::Location => f.write_str("location"),
            EventKind::Unknown(name) => write!(f, "unknown({})", name),
        }
    }
}
