// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device cloud transport.
//!
//! The relay needs two things from the cloud: an access token, and a
//! long-lived stream of events for one device.
//!
//! ```text
//! DeviceCloud Trait
//! +-- ParticleCloud  (OAuth password grant + SSE event stream)
//! ```

pub mod particle;
pub mod sse;

pub use particle::ParticleCloud;
pub use sse::{SseDecoder, SseError, SseFrame};

use crate::event::RawEvent;
use futures::stream::BoxStream;
use std::fmt;
use thiserror::Error;

/// Stream of raw events. Ends (or yields an error) when the subscription
/// is lost.
pub type EventStream = BoxStream<'static, Result<RawEvent, StreamError>>;

/// Authentication failures. Fatal for the session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("login request failed: {0}")]
    Transport(String),

    #[error("unexpected login response: {0}")]
    InvalidResponse(String),
}

/// Event subscription failures. Fatal for the session.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("event stream rejected: {0}")]
    Rejected(String),

    #[error("event stream request failed: {0}")]
    Transport(String),

    #[error("event stream closed by server")]
    Disconnected,

    #[error("invalid event stream URL: {0}")]
    InvalidUrl(String),
}

/// Account credentials for the device cloud.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token returned by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for request headers.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Which events a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event the device publishes.
    All,
    /// Events whose name starts with the given prefix.
    Prefix(String),
}

impl EventFilter {
    /// Parse a configured filter. `event` (the catch-all event name) and an
    /// empty string both mean all events.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "event" {
            EventFilter::All
        } else {
            EventFilter::Prefix(s.to_string())
        }
    }

    /// Check whether an event name passes this filter.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => f.write_str("*"),
            EventFilter::Prefix(p) => write!(f, "{}*", p),
        }
    }
}

/// Device cloud capability used by the session.
pub trait DeviceCloud: Send + Sync {
    /// Exchange credentials for an access token.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<AccessToken, AuthError>> + Send;

    /// Subscribe to a device's events.
    fn open_event_stream(
        &self,
        device_id: &str,
        filter: &EventFilter,
        token: &AccessToken,
    ) -> impl std::future::Future<Output = Result<EventStream, StreamError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_filter_parse() {
        assert_eq!(EventFilter::parse("event"), EventFilter::All);
        assert_eq!(EventFilter::parse(""), EventFilter::All);
        assert_eq!(
            EventFilter::parse(" GNSS/ "),
            EventFilter::Prefix("GNSS/".to_string())
        );
    }

    #[test]
    fn test_event_filter_matches() {
        assert!(EventFilter::All.matches("anything"));

        let gnss = EventFilter::Prefix("GNSS".to_string());
        assert!(gnss.matches("GNSS/Bat"));
        assert!(gnss.matches("GNSS/data"));
        assert!(!gnss.matches("spark/status"));
        assert_eq!(gnss.to_string(), "GNSS*");
    }

    #[test]
    fn test_secrets_are_redacted() {
        let creds = Credentials::new("me", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));

        let token = AccessToken::new("abcdef");
        assert!(!format!("{:?}", token).contains("abcdef"));
        assert_eq!(token.secret(), "abcdef");
    }
}
