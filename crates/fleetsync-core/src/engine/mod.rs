// ── Sync engine handle ──
//
// `SyncEngine` is the public face of the connection state machine: a
// cheap-to-clone handle whose methods enqueue signals for a single
// driver task. Nothing here blocks and nothing returns an error.

mod machine;
mod message;
mod source;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub use machine::{ConnectionMachine, HintSource, Signal};
pub use message::PushMessage;
pub use source::{Connector, FleetSource, Transport, WebSocketConnector};

use crate::config::EngineConfig;
use crate::model::{Alert, ConnectionStatus};
use crate::status::{DisplayStatus, compute_status};
use crate::store::DataStore;

/// Handle to a running sync engine.
///
/// Construct with [`SyncEngine::spawn`] inside a Tokio runtime, then call
/// [`start`](Self::start). Clones share the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    signals: mpsc::UnboundedSender<Signal>,
    status: watch::Receiver<ConnectionStatus>,
    alerts: broadcast::Sender<Alert>,
    store: Arc<DataStore>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Build the state machine and spawn its driver task. The engine is
    /// idle until [`start`](Self::start).
    pub fn spawn<S, C>(config: EngineConfig, source: S, connector: C) -> Self
    where
        S: FleetSource,
        C: Connector,
    {
        let (signals, rx) = mpsc::unbounded_channel();
        let machine = ConnectionMachine::new(config, source, connector, signals.clone());
        let status = machine.subscribe_status();
        let alerts = machine.alert_sender();
        let store = Arc::clone(machine.store());
        let cancel = CancellationToken::new();

        let driver = tokio::spawn(drive(machine, rx, cancel.clone()));

        Self {
            inner: Arc::new(EngineInner {
                signals,
                status,
                alerts,
                store,
                cancel,
                driver: Mutex::new(Some(driver)),
            }),
        }
    }

    /// Connect and begin syncing. No-op while already running.
    pub fn start(&self) {
        self.send(Signal::Start);
    }

    /// Close the transport, cancel the reconnect timer and stop polling.
    pub fn stop(&self) {
        self.send(Signal::Stop);
    }

    /// Visibility regained, network back online, or a user request.
    pub fn notify_reconnect_hint(&self, source: HintSource) {
        self.send(Signal::ReconnectHint(source));
    }

    /// Apply a raw push payload obtained outside the transport.
    pub fn on_incoming_message(&self, raw: impl Into<String>) {
        self.send(Signal::Incoming(raw.into()));
    }

    /// Look up one event by id and feed it through the fan-out, as for a
    /// push-notification wake-up that only carries the id.
    pub fn fetch_event(&self, id: i64) {
        self.send(Signal::FetchEvent(id));
    }

    /// Ask the server to stream (or stop streaming) its log lines. The
    /// preference is re-sent on every reconnect.
    pub fn set_log_delivery(&self, enabled: bool) {
        self.send(Signal::SetLogDelivery(enabled));
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn alerts(&self) -> broadcast::Receiver<Alert> {
        self.inner.alerts.subscribe()
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Status label for `now`. Meant to be re-evaluated by a UI tick.
    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayStatus {
        compute_status(self.current_status(), self.inner.store.latest_fix_time(), now)
    }

    /// Stop the engine and wait for the driver task to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let driver = self.inner.driver.lock().await.take();
        if let Some(handle) = driver {
            let _ = handle.await;
        }
    }

    fn send(&self, signal: Signal) {
        if self.inner.signals.send(signal).is_err() {
            trace!("engine already shut down, signal dropped");
        }
    }
}

// ── Driver task ──────────────────────────────────────────────────────

async fn drive<S, C>(
    mut machine: ConnectionMachine<S, C>,
    mut rx: mpsc::UnboundedReceiver<Signal>,
    cancel: CancellationToken,
) where
    S: FleetSource,
    C: Connector,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            signal = rx.recv() => {
                let Some(signal) = signal else { break };
                machine.dispatch(signal);
            }
        }
    }
    machine.dispatch(Signal::Stop);
    debug!("sync engine driver exited");
}
