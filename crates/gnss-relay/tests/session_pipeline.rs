// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end session tests against in-memory cloud and store fakes.

use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use gnss_relay::{
    AccessToken, AuthError, Credentials, DeviceCloud, EventFilter, EventStream, FieldValue,
    PointStore, RawEvent, SessionError, SessionManager, SessionState, Sink, StoragePoint,
    StreamError, TransformConfig, Transformer, WriteError, WriteOptions,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Clone, Copy)]
enum Behavior {
    Normal,
    RejectLogin,
    RejectStream,
}

struct FakeCloud {
    behavior: Behavior,
    events: Mutex<Option<Vec<RawEvent>>>,
    /// Keep the stream open after the scripted events.
    stay_open: bool,
    subscriptions: Arc<Mutex<Vec<(String, EventFilter, String)>>>,
}

impl FakeCloud {
    fn new(behavior: Behavior, events: Vec<RawEvent>, stay_open: bool) -> Self {
        Self {
            behavior,
            events: Mutex::new(Some(events)),
            stay_open,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl DeviceCloud for FakeCloud {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        match self.behavior {
            Behavior::RejectLogin => Err(AuthError::Rejected("User credentials are invalid".into())),
            _ => Ok(AccessToken::new(format!("token-for-{}", credentials.username))),
        }
    }

    async fn open_event_stream(
        &self,
        device_id: &str,
        filter: &EventFilter,
        token: &AccessToken,
    ) -> Result<EventStream, StreamError> {
        self.subscriptions.lock().expect("lock").push((
            device_id.to_string(),
            filter.clone(),
            token.secret().to_string(),
        ));

        if let Behavior::RejectStream = self.behavior {
            return Err(StreamError::Rejected("Permission Denied".into()));
        }

        let events = self.events.lock().expect("lock").take().unwrap_or_default();
        let scripted = stream::iter(events.into_iter().map(Ok));
        if self.stay_open {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }
}

#[derive(Clone, Default)]
struct RecordingStore {
    writes: Arc<Mutex<Vec<(WriteOptions, Vec<StoragePoint>)>>>,
    /// Zero-based write calls that fail.
    fail_calls: Vec<usize>,
}

impl RecordingStore {
    fn write_count(&self) -> usize {
        self.writes.lock().expect("lock").len()
    }
}

impl PointStore for RecordingStore {
    async fn write_batch(
        &self,
        points: &[StoragePoint],
        options: &WriteOptions,
    ) -> Result<(), WriteError> {
        let mut writes = self.writes.lock().expect("lock");
        let call = writes.len();
        writes.push((options.clone(), points.to_vec()));
        if self.fail_calls.contains(&call) {
            return Err(WriteError::Rejected {
                status: 500,
                body: "timeout".into(),
            });
        }
        Ok(())
    }
}

fn event(name: &str, data: &str, secs: u32) -> RawEvent {
    RawEvent::new(
        name,
        data,
        Utc.with_ymd_and_hms(2017, 6, 1, 12, 0, secs).unwrap(),
    )
}

fn scripted_events() -> Vec<RawEvent> {
    vec![
        event("spark/status", "online", 0),
        event("GNSS/Bat", "87", 1),
        event(
            "GNSS/data",
            r#"{"s_id":"abc123","lat":47.6062,"lon":-122.3321,"alt":10.5,"spd":3.2}"#,
            2,
        ),
    ]
}

fn manager(
    cloud: FakeCloud,
    store: RecordingStore,
) -> SessionManager<FakeCloud, RecordingStore> {
    SessionManager::new(
        cloud,
        Credentials::new("me@example.com", "secret"),
        "tracker-01",
        EventFilter::All,
        Transformer::new(TransformConfig::default()),
        Sink::new(store),
    )
}

/// Fire shutdown once `store` has seen `writes` write calls.
fn shutdown_after_writes(store: &RecordingStore, writes: usize) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let store = store.clone();
    tokio::spawn(async move {
        while store.write_count() < writes {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = tx.send(());
    });
    rx
}

#[tokio::test]
async fn test_three_events_produce_two_ordered_writes() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::Normal, scripted_events(), true);
    let subscriptions = Arc::clone(&cloud.subscriptions);
    let mut session = manager(cloud, store.clone());
    assert_eq!(session.state(), SessionState::Unauthenticated);

    let shutdown = shutdown_after_writes(&store, 2);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        session.run(async {
            let _ = shutdown.await;
        }),
    )
    .await
    .expect("session stops on shutdown");

    assert!(result.is_ok());
    assert_eq!(session.state(), SessionState::Terminated);

    let writes = store.writes.lock().expect("lock");
    assert_eq!(writes.len(), 2);

    let (options, battery) = &writes[0];
    assert_eq!(options.retention_policy, "location_2y");
    assert_eq!(battery.len(), 1);
    assert_eq!(battery[0].measurement, "battery");
    assert_eq!(
        battery[0].field_value("percentage"),
        Some(&FieldValue::Float(87.0))
    );

    let (_, location) = &writes[1];
    assert_eq!(location.len(), 1);
    assert_eq!(location[0].measurement, "location");
    assert_eq!(
        location[0].tags.get("session_id").map(String::as_str),
        Some("abc123")
    );
    assert_eq!(
        location[0].field_value("geohash"),
        Some(&FieldValue::String("c23nb62qp".into()))
    );

    let snap = session.stats().snapshot();
    assert_eq!(snap.events_received, 3);
    assert_eq!(snap.events_transformed, 2);
    assert_eq!(snap.events_skipped, 1);
    assert_eq!(snap.points_written, 2);
    assert_eq!(snap.write_failures, 0);

    let subscriptions = subscriptions.lock().expect("lock");
    assert_eq!(
        subscriptions.as_slice(),
        &[(
            "tracker-01".to_string(),
            EventFilter::All,
            "token-for-me@example.com".to_string()
        )]
    );
    assert!(session.context().token.is_some());
}

#[tokio::test]
async fn test_failed_write_does_not_stop_next_event() {
    let store = RecordingStore {
        fail_calls: vec![0],
        ..Default::default()
    };
    let cloud = FakeCloud::new(Behavior::Normal, scripted_events(), true);
    let mut session = manager(cloud, store.clone());

    let shutdown = shutdown_after_writes(&store, 2);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        session.run(async {
            let _ = shutdown.await;
        }),
    )
    .await
    .expect("session stops on shutdown");
    assert!(result.is_ok());

    let writes = store.writes.lock().expect("lock");
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].1[0].measurement, "location");

    let snap = session.stats().snapshot();
    assert_eq!(snap.write_failures, 1);
    assert_eq!(snap.points_written, 1);
}

#[tokio::test]
async fn test_malformed_events_are_skipped() {
    let store = RecordingStore::default();
    let events = vec![
        event("GNSS/Bat", "not-a-number", 0),
        event("GNSS/data", r#"{"s_id":"abc","lon":1,"alt":0,"spd":0}"#, 1),
        event("GNSS/data", r#"{"s_id":"abc","lat":91,"lon":1,"alt":0,"spd":0}"#, 2),
        event("GNSS/Bat", "50", 3),
    ];
    let cloud = FakeCloud::new(Behavior::Normal, events, true);
    let mut session = manager(cloud, store.clone());

    let shutdown = shutdown_after_writes(&store, 1);
    tokio::time::timeout(
        Duration::from_secs(5),
        session.run(async {
            let _ = shutdown.await;
        }),
    )
    .await
    .expect("session stops on shutdown")
    .expect("graceful shutdown");

    let snap = session.stats().snapshot();
    assert_eq!(snap.events_received, 4);
    assert_eq!(snap.events_skipped, 3);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_login_rejection_is_fatal() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::RejectLogin, scripted_events(), true);
    let subscriptions = Arc::clone(&cloud.subscriptions);
    let mut session = manager(cloud, store.clone());

    let result = session.run(std::future::pending()).await;

    assert!(matches!(result, Err(SessionError::Auth(AuthError::Rejected(_)))));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(subscriptions.lock().expect("lock").is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_stream_rejection_is_fatal() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::RejectStream, scripted_events(), true);
    let mut session = manager(cloud, store.clone());

    let result = session.run(std::future::pending()).await;

    assert!(matches!(
        result,
        Err(SessionError::Stream(StreamError::Rejected(_)))
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_stream_end_fails_after_processing_events() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::Normal, scripted_events(), false);
    let mut session = manager(cloud, store.clone());

    let result = session.run(std::future::pending()).await;

    assert!(matches!(
        result,
        Err(SessionError::Stream(StreamError::Disconnected))
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn test_shutdown_before_login_completes() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::Normal, scripted_events(), true);
    let mut session = manager(cloud, store.clone());

    session.run(async {}).await.expect("graceful shutdown");

    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_state_receiver_follows_session() {
    let store = RecordingStore::default();
    let cloud = FakeCloud::new(Behavior::Normal, Vec::new(), true);
    let mut session = manager(cloud, store);

    let mut listening = session.subscribe_state();
    let observer = session.subscribe_state();
    assert_eq!(*observer.borrow(), SessionState::Unauthenticated);

    tokio::time::timeout(
        Duration::from_secs(5),
        session.run(async move {
            let _ = listening
                .wait_for(|state| *state == SessionState::Listening)
                .await;
        }),
    )
    .await
    .expect("shutdown once listening")
    .expect("graceful shutdown");

    assert!(observer.has_changed().expect("sender alive"));
    assert_eq!(*observer.borrow(), SessionState::Terminated);
}

#[tokio::test]
async fn test_state_receiver_sees_failure() {
    let cloud = FakeCloud::new(Behavior::RejectLogin, Vec::new(), true);
    let mut session = manager(cloud, RecordingStore::default());
    let observer = session.subscribe_state();

    assert!(session.run(std::future::pending()).await.is_err());
    assert_eq!(*observer.borrow(), SessionState::Failed);
}
