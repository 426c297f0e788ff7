// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GNSS Telemetry Relay
//!
//! Subscribes to a tracker's event stream on the Particle device cloud and
//! writes battery and position telemetry into InfluxDB.
//!
//! # Architecture
//!
//! ```text
//! Particle cloud --SSE--> SessionManager --RawEvent--> Transformer
//!                               |                          |
//!                               |                   Vec<StoragePoint>
//!                               v                          |
//!                         SessionStats          Sink --/write--> InfluxDB
//! ```
//!
//! # Events
//!
//! - `GNSS/Bat`: battery percentage, written to measurement `battery`
//! - `GNSS/data`: position fix (`s_id`, `lat`, `lon`, `alt`, `spd`), written
//!   to measurement `location` with a geohash and a `session_id` tag
//! - anything else is logged and ignored
//!
//! # Quick Start
//!
//! ```bash
//! gnss-relay gen-config --output relay.toml
//! gnss-relay validate --config relay.toml
//! gnss-relay --config relay.toml
//! ```

pub mod cloud;
pub mod config;
pub mod event;
pub mod geohash;
pub mod point;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod transform;

pub use cloud::{
    AccessToken, AuthError, Credentials, DeviceCloud, EventFilter, EventStream, ParticleCloud,
    StreamError,
};
pub use config::{ConfigError, RelayConfig, TransformConfig};
pub use event::{EventKind, RawEvent};
pub use point::{FieldValue, Precision, StoragePoint};
pub use session::{
    SessionContext, SessionError, SessionManager, SessionState, SessionStats,
    SessionStatsSnapshot,
};
pub use shutdown::shutdown_signal;
pub use sink::{InfluxDb, PointStore, Sink, WriteError, WriteOptions};
pub use transform::{MalformedPayload, TransformError, Transformer};
