// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Point sink.
//!
//! [`Sink`] takes the points derived from one event and hands them to a
//! [`PointStore`] as one request per distinct retention policy and precision.
//!
//! ```text
//! PointStore Trait
//! +-- InfluxDb  (InfluxDB 1.x HTTP /write)
//! ```

pub mod influx;

pub use influx::InfluxDb;

use crate::point::{Precision, StoragePoint};
use thiserror::Error;

/// Per-request write parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteOptions {
    pub retention_policy: String,
    pub precision: Precision,
}

impl WriteOptions {
    /// Options a point asks to be written with.
    pub fn for_point(point: &StoragePoint) -> Self {
        Self {
            retention_policy: point.retention_policy.clone(),
            precision: point.precision,
        }
    }
}

/// Write failures. Recovered by the session: the points are lost.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write request failed: {0}")]
    Transport(String),

    #[error("write rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("point for measurement {0} has no fields")]
    NoFields(String),
}

/// Time-series backend capability used by the sink.
pub trait PointStore: Send + Sync {
    /// Write points sharing the same options in a single request.
    fn write_batch(
        &self,
        points: &[StoragePoint],
        options: &WriteOptions,
    ) -> impl std::future::Future<Output = Result<(), WriteError>> + Send;
}

/// Batches points and submits them to a store.
#[derive(Debug)]
pub struct Sink<S> {
    store: S,
}

impl<S: PointStore> Sink<S> {
    /// Create a sink over a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write points.
    ///
    /// An empty slice is a no-op. Stops at the first failed request.
    pub async fn write(&self, points: &[StoragePoint]) -> Result<(), WriteError> {
        let Some(first) = points.first() else {
            return Ok(());
        };

        if let Some(empty) = points.iter().find(|p| p.fields.is_empty()) {
            return Err(WriteError::NoFields(empty.measurement.clone()));
        }

        let options = WriteOptions::for_point(first);
        if points.iter().all(|p| WriteOptions::for_point(p) == options) {
            return self.store.write_batch(points, &options).await;
        }

        for (options, group) in group_by_options(points) {
            self.store.write_batch(&group, &options).await?;
        }
        Ok(())
    }
}

/// Split points by write options, keeping first-seen group order and the
/// point order inside each group.
fn group_by_options(points: &[StoragePoint]) -> Vec<(WriteOptions, Vec<StoragePoint>)> {
    let mut groups: Vec<(WriteOptions, Vec<StoragePoint>)> = Vec::new();
    for point in points {
        let options = WriteOptions::for_point(point);
        match groups.iter_mut().find(|(o, _)| *o == options) {
            Some((_, group)) => group.push(point.clone()),
            None => groups.push((options, vec![point.clone()])),
        }
    }
    groups
}
