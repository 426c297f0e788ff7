// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream session.
//!
//! One run of the relay: log in, subscribe, then transform and write every
//! event in delivery order until shutdown or until the stream is lost.
//!
//! ```text
//! Unauthenticated -> Authenticating -> Subscribing -> Listening -+-> Terminated
//!                          |                |             |      |
//!                          +----------------+-------------+------+-> Failed
//! ```
//!
//! Login and subscription failures are fatal. Per-event failures (bad
//! payloads, rejected writes) are logged and counted; they never stop the
//! session.

pub mod stats;

pub use stats::{SessionStats, SessionStatsSnapshot};

use crate::cloud::{AccessToken, AuthError, Credentials, DeviceCloud, EventFilter, StreamError};
use crate::event::RawEvent;
use crate::sink::{PointStore, Sink};
use crate::transform::Transformer;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Subscribing,
    Listening,
    /// Stopped on request.
    Terminated,
    /// Stopped by a fatal error.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Subscribing => "subscribing",
            SessionState::Listening => "listening",
            SessionState::Terminated => "terminated",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Fatal session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("event stream failed: {0}")]
    Stream(#[from] StreamError),
}

/// What the session is subscribed to, and with which token.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub device_id: String,
    pub filter: EventFilter,
    /// Set once login succeeds.
    pub token: Option<AccessToken>,
}

/// Drives one relay session.
pub struct SessionManager<C, S> {
    cloud: C,
    credentials: Credentials,
    context: SessionContext,
    transformer: Transformer,
    sink: Sink<S>,
    stats: Arc<SessionStats>,
    state: watch::Sender<SessionState>,
}

impl<C: DeviceCloud, S: PointStore> SessionManager<C, S> {
    pub fn new(
        cloud: C,
        credentials: Credentials,
        device_id: impl Into<String>,
        filter: EventFilter,
        transformer: Transformer,
        sink: Sink<S>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            cloud,
            credentials,
            context: SessionContext {
                device_id: device_id.into(),
                filter,
                token: None,
            },
            transformer,
            sink,
            stats: Arc::new(SessionStats::new()),
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Run the session until `shutdown` resolves or a fatal error occurs.
    ///
    /// Returns `Ok(())` only on requested shutdown. The end of the event
    /// stream is reported as `StreamError::Disconnected`.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SessionError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.set_state(SessionState::Authenticating);
        let login = tokio::select! {
            biased;
            _ = &mut shutdown => {
                self.terminate();
                return Ok(());
            }
            result = self.cloud.login(&self.credentials) => result,
        };
        let token = match login {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e.into())),
        };
        tracing::info!("Logged in to device cloud as {}", self.credentials.username);
        self.context.token = Some(token.clone());

        self.set_state(SessionState::Subscribing);
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown => {
                self.terminate();
                return Ok(());
            }
            result = self.cloud.open_event_stream(
                &self.context.device_id,
                &self.context.filter,
                &token,
            ) => result,
        };
        let mut events = match opened {
            Ok(events) => events,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.set_state(SessionState::Listening);
        tracing::info!(
            "Listening for {} events from {}",
            self.context.filter,
            self.context.device_id
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.terminate();
                    return Ok(());
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => self.handle_event(&event).await,
                Some(Err(e)) => return Err(self.fail(e.into())),
                None => return Err(self.fail(StreamError::Disconnected.into())),
            }
        }
    }

    async fn handle_event(&self, event: &RawEvent) {
        self.stats.record_received();

        let points = self.transformer.transform(event);
        if points.is_empty() {
            self.stats.record_skipped();
            return;
        }
        self.stats.record_transformed();

        match self.sink.write(&points).await {
            Ok(()) => self.stats.record_written(points.len()),
            Err(e) => {
                self.stats.record_write_failure();
                tracing::warn!(
                    "Failed to write {} event from {}: {}",
                    event.name,
                    event.source(),
                    e
                );
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        tracing::debug!("Session state: {} -> {}", previous, state);
    }

    fn terminate(&self) {
        tracing::info!("Shutdown requested, closing session");
        self.set_state(SessionState::Terminated);
    }

    fn fail(&self, err: SessionError) -> SessionError {
        tracing::error!("{}", err);
        self.set_state(SessionState::Failed);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Listening.to_string(), "listening");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_session_error_from() {
        let err: SessionError = AuthError::Rejected("bad password".into()).into();
        assert!(matches!(err, SessionError::Auth(_)));
        assert!(err.to_string().contains("bad password"));

        let err: SessionError = StreamError::Disconnected.into();
        assert!(matches!(err, SessionError::Stream(StreamError::Disconnected)));
    }
}
