// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Particle device cloud client.
//!
//! - Login: `POST /oauth/token` (password grant, public `particle` client)
//! - Events: `GET /v1/devices/{device}/events[/{prefix}]` as `text/event-stream`
//!
//! Each SSE frame carries the event name in `event:` and a JSON envelope in
//! `data:`:
//!
//! ```text
//! event: GNSS/Bat
//! data: {"data":"87","ttl":60,"published_at":"2017-06-01T12:00:00.000Z","coreid":"3a00..."}
//! ```

use super::sse::{SseDecoder, SseFrame};
use super::{AccessToken, AuthError, Credentials, DeviceCloud, EventFilter, EventStream, StreamError};
use crate::event::RawEvent;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// OAuth client id/secret shared by all Particle API users.
const OAUTH_CLIENT_ID: &str = "particle";
const OAUTH_CLIENT_SECRET: &str = "particle";

/// Device id that selects every device owned by the account.
const ALL_DEVICES: &str = "mine";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    data: Option<String>,
    #[serde(default = "Utc::now")]
    published_at: DateTime<Utc>,
    #[serde(default)]
    coreid: Option<String>,
}

/// Particle cloud REST/SSE client.
#[derive(Debug, Clone)]
pub struct ParticleCloud {
    api_url: String,
    client: Client,
}

impl ParticleCloud {
    /// Create a client for the given API base URL
    /// (e.g., "https://api.particle.io").
    ///
    /// No overall request timeout is set: the event stream is long-lived.
    pub fn new(api_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self::with_client(api_url, client))
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(api_url: impl Into<String>, client: Client) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Subscription URL for a device and filter. Device id and prefix are
    /// percent-encoded as single path segments.
    pub fn events_url(&self, device_id: &str, filter: &EventFilter) -> Result<Url, StreamError> {
        let invalid = || StreamError::InvalidUrl(self.api_url.clone());
        let mut url = Url::parse(&self.api_url).map_err(|_| invalid())?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| invalid())?;
            segments.pop_if_empty().extend(["v1", "devices"]);
            if device_id != ALL_DEVICES {
                segments.push(device_id);
            }
            segments.push("events");
            if let EventFilter::Prefix(prefix) = filter {
                segments.push(prefix);
            }
        }
        Ok(url)
    }
}

impl DeviceCloud for ParticleCloud {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        let url = format!("{}/oauth/token", self.api_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(OAUTH_CLIENT_ID, Some(OAUTH_CLIENT_SECRET))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(error_reason(response).await));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        tracing::debug!("Particle login succeeded for {}", credentials.username);
        Ok(AccessToken::new(token.access_token))
    }

    async fn open_event_stream(
        &self,
        device_id: &str,
        filter: &EventFilter,
        token: &AccessToken,
    ) -> Result<EventStream, StreamError> {
        let url = self.events_url(device_id, filter)?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token.secret())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StreamError::Rejected(error_reason(response).await));
        }

        tracing::debug!("Subscribed to {}", url);
        Ok(decode_events(response.bytes_stream().boxed(), filter.clone()))
    }
}

/// Best human-readable reason from a failed API response.
async fn error_reason(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            error_description: Some(desc),
            ..
        }) => desc,
        Ok(ErrorResponse {
            error: Some(error), ..
        }) => error,
        _ => format!("HTTP {}", status),
    }
}

struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<RawEvent>,
    filter: EventFilter,
    closed: bool,
}

/// Turn an SSE byte stream into raw events.
///
/// The stream ends with `StreamError::Disconnected` when the body ends, or
/// with `StreamError::Transport` when reading or decoding fails.
fn decode_events<S, B, E>(body: S, filter: EventFilter) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        filter,
        closed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.closed {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => match state.decoder.push(chunk.as_ref()) {
                    Ok(frames) => {
                        for frame in frames {
                            if let Some(event) = frame_to_event(frame) {
                                if state.filter.matches(&event.name) {
                                    state.ready.push_back(event);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        state.closed = true;
                        return Some((Err(StreamError::Transport(e.to_string())), state));
                    }
                },
                Some(Err(e)) => {
                    state.closed = true;
                    return Some((Err(StreamError::Transport(e.to_string())), state));
                }
                None => {
                    state.closed = true;
                    return Some((Err(StreamError::Disconnected), state));
                }
            }
        }
    })
    .boxed()
}

/// Unwrap a frame's envelope. Unnamed frames and unreadable envelopes are
/// skipped.
fn frame_to_event(frame: SseFrame) -> Option<RawEvent> {
    let name = match frame.event {
        Some(name) if !name.is_empty() => name,
        _ => return None,
    };

    match serde_json::from_str::<EventEnvelope>(&frame.data) {
        Ok(envelope) => Some(RawEvent {
            name,
            data: envelope.data.unwrap_or_default(),
            published_at: envelope.published_at,
            device_id: envelope.coreid,
        }),
        Err(e) => {
            tracing::warn!("Skipping {} event with unreadable envelope: {}", name, e);
            None
        }
    }
}
