#![allow(clippy::unwrap_used)]
// End-to-end tests for `SyncEngine` with scripted collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;

use fleetsync_api::TransportEvent;
use fleetsync_core::{
    Alert, AlertPreferences, ConnectionStatus, Connector, CoreError, DisplayStatus, EngineConfig,
    Event, FleetSource, HintSource, Snapshot, SyncEngine, Transport,
};

// ── Fakes ───────────────────────────────────────────────────────────

type Callback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

#[derive(Clone, Default)]
struct ScriptedConnector {
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl ScriptedConnector {
    fn attempts(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    fn emit(&self, event: TransportEvent) {
        let callback = self.callbacks.lock().unwrap().last().cloned().unwrap();
        callback(event);
    }
}

struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _text: &str) -> Result<(), CoreError> {
        Ok(())
    }

    fn close(&self) {}
}

impl Connector for ScriptedConnector {
    type Transport = NullTransport;

    fn connect<F>(&self, on_event: F) -> NullTransport
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        self.callbacks.lock().unwrap().push(Arc::new(on_event));
        NullTransport
    }
}

#[derive(Clone)]
struct StaticSource;

impl FleetSource for StaticSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, CoreError> {
        Ok(Snapshot {
            devices: serde_json::from_value(json!([{ "id": 1, "name": "Truck 1" }])).unwrap(),
            positions: Vec::new(),
        })
    }

    async fn fetch_event(&self, id: i64) -> Result<Event, CoreError> {
        Err(CoreError::EventNotFound { id })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn wait_for(rx: &mut watch::Receiver<ConnectionStatus>, expected: ConnectionStatus) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == expected))
        .await
        .unwrap()
        .unwrap();
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn spawn_engine(config: EngineConfig) -> (SyncEngine, ScriptedConnector) {
    let connector = ScriptedConnector::default();
    let engine = SyncEngine::spawn(config, StaticSource, connector.clone());
    (engine, connector)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn open_push_and_shutdown() {
    let (engine, connector) = spawn_engine(EngineConfig::default());
    let mut status = engine.status();

    engine.start();
    wait_until(|| connector.attempts() == 1).await;
    connector.emit(TransportEvent::Opened);
    wait_for(&mut status, ConnectionStatus::Live).await;

    // Open triggers a full refresh.
    wait_until(|| engine.store().device(1).is_some()).await;

    let now = Utc::now();
    connector.emit(TransportEvent::Message(
        json!({ "positions": [{ "deviceId": 1, "fixTime": now.to_rfc3339() }] }).to_string(),
    ));
    wait_until(|| engine.store().position(1).is_some()).await;
    assert_eq!(engine.display_status(now), DisplayStatus::Live);

    engine.shutdown().await;
    assert_eq!(engine.current_status(), ConnectionStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn hint_after_drop_reconnects_immediately() {
    let (engine, connector) = spawn_engine(EngineConfig {
        backoff: vec![Duration::from_secs(60)],
        ..EngineConfig::default()
    });
    let mut status = engine.status();

    engine.start();
    wait_until(|| connector.attempts() == 1).await;
    connector.emit(TransportEvent::Opened);
    wait_for(&mut status, ConnectionStatus::Live).await;

    connector.emit(TransportEvent::Closed {
        code: 1006,
        reason: "reset".into(),
    });
    wait_for(&mut status, ConnectionStatus::Offline).await;

    engine.notify_reconnect_hint(HintSource::Online);
    wait_until(|| connector.attempts() == 2).await;
    assert_eq!(engine.current_status(), ConnectionStatus::Connecting);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn incoming_events_raise_alerts() {
    let (engine, _connector) = spawn_engine(EngineConfig {
        alerts: AlertPreferences {
            sound_events: vec!["deviceOverspeed".into()],
            ..AlertPreferences::default()
        },
        ..EngineConfig::default()
    });
    let mut alerts = engine.alerts();

    engine.on_incoming_message(
        json!({ "events": [{ "id": 5, "type": "deviceOverspeed", "deviceId": 1,
                              "attributes": { "message": "Overspeed" } }] })
        .to_string(),
    );

    let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        alert,
        Alert::Audible {
            event_types: vec!["deviceOverspeed".into()]
        }
    );
    let notifications = engine.store().notifications_snapshot();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].id, "event-5");

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn signals_after_shutdown_are_ignored() {
    let (engine, connector) = spawn_engine(EngineConfig::default());
    engine.shutdown().await;

    engine.start();
    engine.fetch_event(1);
    engine.set_log_delivery(true);
    tokio::task::yield_now().await;

    assert_eq!(connector.attempts(), 0);
}
