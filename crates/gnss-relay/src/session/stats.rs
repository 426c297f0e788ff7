// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by the session while listening.
#[derive(Debug)]
pub struct SessionStats {
    /// Events delivered by the stream.
    pub events_received: AtomicU64,

    /// Events that produced at least one point.
    pub events_transformed: AtomicU64,

    /// Unknown events and events with unusable payloads.
    pub events_skipped: AtomicU64,

    /// Points accepted by the store.
    pub points_written: AtomicU64,

    /// Failed write requests.
    pub write_failures: AtomicU64,

    /// Session creation time.
    pub created: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_transformed: AtomicU64::new(0),
            events_skipped: AtomicU64::new(0),
            points_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub(crate) fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transformed(&self) {
        self.events_transformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.events_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self, points: usize) {
        self.points_written
            .fetch_add(points as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_transformed: self.events_transformed.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            points_written: self.points_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub events_received: u64,
    pub events_transformed: u64,
    pub events_skipped: u64,
    pub points_written: u64,
    pub write_failures: u64,
    pub uptime_secs: u64,
}

impl SessionStatsSnapshot {
    /// Calculate events per second.
    pub fn events_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.events_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

impl fmt::Display for SessionStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events={} ({:.2}/s) transformed={} skipped={} points_written={} write_failures={} uptime={}s",
            self.events_received,
            self.events_per_second(),
            self.events_transformed,
            self.events_skipped,
            self.points_written,
            self.write_failures,
            self.uptime_secs
        )
    }
}
