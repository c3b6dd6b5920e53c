// ── Connection state machine ──
//
// Owns the connection status, the current transport, the reconnect
// scheduler and the fallback poller. Every input arrives as a `Signal`
// and goes through `dispatch`, so the whole transition table lives in
// one match. Async work (refreshes, event lookups, timers, transport
// callbacks) reports back by sending another signal.

use std::sync::Arc;

use strum::Display;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use fleetsync_api::websocket::TransportEvent;

use super::message::PushMessage;
use super::source::{Connector, FleetSource, Transport};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::fanout::EventFanout;
use crate::model::{Alert, ConnectionStatus, Event};
use crate::poller::FallbackPoller;
use crate::scheduler::ReconnectScheduler;
use crate::store::{DataStore, Snapshot};

const ALERT_CHANNEL_SIZE: usize = 16;

/// Why an external party asked for a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum HintSource {
    /// The UI became visible again.
    Visibility,
    /// Network connectivity came back.
    Online,
    /// Explicit user request.
    User,
}

/// Everything that can happen to the engine.
#[derive(Debug)]
pub enum Signal {
    Start,
    Stop,
    /// Lifecycle callback of the transport started at `generation`.
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    BackoffElapsed {
        ticket: u64,
    },
    PollTick,
    RefreshCompleted(Result<Snapshot, CoreError>),
    ReconnectHint(HintSource),
    /// A raw push payload delivered by the host rather than the transport.
    Incoming(String),
    FetchEvent(i64),
    EventFetched(Result<Event, CoreError>),
    SetLogDelivery(bool),
}

/// The orchestrator. Not `Sync`: one task owns it and feeds it signals.
pub struct ConnectionMachine<S: FleetSource, C: Connector> {
    config: EngineConfig,
    source: S,
    connector: C,
    store: Arc<DataStore>,
    signals: mpsc::UnboundedSender<Signal>,
    status: watch::Sender<ConnectionStatus>,
    alerts: broadcast::Sender<Alert>,
    scheduler: ReconnectScheduler,
    poller: FallbackPoller,
    fanout: EventFanout,
    transport: Option<C::Transport>,
    transport_open: bool,
    transport_generation: u64,
    refreshes_in_flight: usize,
    running: bool,
    log_delivery: bool,
}

impl<S: FleetSource, C: Connector> ConnectionMachine<S, C> {
    /// `signals` is where timers, transport callbacks and fetch tasks
    /// report back; the owner must route them into [`dispatch`](Self::dispatch).
    pub fn new(
        config: EngineConfig,
        source: S,
        connector: C,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        let store = Arc::new(DataStore::with_limits(config.max_log_lines, config.max_events));
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_SIZE);
        let scheduler = ReconnectScheduler::new(config.backoff.clone());
        let fanout = EventFanout::new(config.alerts.clone());

        Self {
            config,
            source,
            connector,
            store,
            signals,
            status,
            alerts,
            scheduler,
            poller: FallbackPoller::new(),
            fanout,
            transport: None,
            transport_open: false,
            transport_generation: 0,
            refreshes_in_flight: 0,
            running: false,
            log_delivery: false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn alert_sender(&self) -> broadcast::Sender<Alert> {
        self.alerts.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_transport_open(&self) -> bool {
        self.transport_open
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn scheduler(&self) -> &ReconnectScheduler {
        &self.scheduler
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Apply one signal. Never fails; problems end up as status or logs.
    pub fn dispatch(&mut self, signal: Signal) {
        match signal {
            Signal::Start => self.start(),
            Signal::Stop => self.stop(),
            Signal::Transport { generation, event } => {
                if generation != self.transport_generation || !self.running {
                    debug!(generation, "dropping callback from superseded transport");
                    return;
                }
                self.on_transport(event);
            }
            Signal::BackoffElapsed { ticket } => {
                if !self.scheduler.take_if_current(ticket) || !self.running {
                    debug!(ticket, "stale reconnect timer ignored");
                    return;
                }
                info!("reconnect timer elapsed");
                self.connect();
            }
            Signal::PollTick => {
                if !self.running || !self.poller.is_running() {
                    return;
                }
                if self.refreshes_in_flight > 0 {
                    debug!("poll tick skipped, refresh still in flight");
                    return;
                }
                self.request_refresh();
            }
            Signal::RefreshCompleted(result) => self.on_refresh_completed(result),
            Signal::ReconnectHint(source) => self.on_reconnect_hint(source),
            Signal::Incoming(raw) => self.on_incoming(&raw),
            Signal::FetchEvent(id) => self.fetch_event(id),
            Signal::EventFetched(result) => match result {
                Ok(event) => self.process_events(&[event]),
                Err(e) => warn!(error = %e, "event lookup failed"),
            },
            Signal::SetLogDelivery(enabled) => {
                self.log_delivery = enabled;
                if self.transport_open {
                    self.send_log_preference();
                }
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    fn start(&mut self) {
        if self.running {
            debug!("start ignored, already running");
            return;
        }
        info!("sync engine starting");
        self.running = true;
        self.connect();
    }

    /// Cancel the backoff timer, stop polling, close the transport.
    fn stop(&mut self) {
        self.scheduler.cancel();
        self.poller.stop();
        self.close_transport();
        if self.running {
            info!("sync engine stopped");
        }
        self.running = false;
        self.set_status(ConnectionStatus::Offline);
    }

    /// Abandon any current transport and start a new one.
    fn connect(&mut self) {
        self.close_transport();
        self.transport_generation += 1;
        let generation = self.transport_generation;
        let signals = self.signals.clone();
        let transport = self.connector.connect(move |event| {
            let _ = signals.send(Signal::Transport { generation, event });
        });
        self.transport = Some(transport);
        self.set_status(ConnectionStatus::Connecting);
        debug!(generation, "transport attempt started");
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.transport_open = false;
    }

    fn reconnect_now(&mut self) {
        self.scheduler.cancel();
        self.scheduler.reset();
        self.connect();
    }

    // ── Transport callbacks ──────────────────────────────────────────

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("push channel live");
                self.transport_open = true;
                self.scheduler.reset();
                self.scheduler.cancel();
                self.poller.stop();
                self.set_status(ConnectionStatus::Live);
                if self.log_delivery {
                    self.send_log_preference();
                }
                self.request_refresh();
            }
            TransportEvent::Message(text) => self.on_incoming(&text),
            TransportEvent::Error(reason) => {
                warn!(reason = %reason, "push channel error");
                self.set_status(ConnectionStatus::Error);
            }
            TransportEvent::Closed { code, reason } => self.on_closed(code, &reason),
        }
    }

    fn on_closed(&mut self, code: u16, reason: &str) {
        let was_open = self.transport_open;
        self.transport = None;
        self.transport_open = false;

        if code == self.config.logout_close_code {
            info!(code, "session ended by server, not reconnecting");
            self.scheduler.cancel();
            self.poller.stop();
            self.running = false;
            self.set_status(ConnectionStatus::Offline);
            return;
        }

        if was_open {
            warn!(code, reason, "push channel lost");
            self.set_status(ConnectionStatus::Offline);
            self.request_refresh();
        } else {
            debug!(code, reason, "connection attempt failed");
            self.set_status(ConnectionStatus::Reconnecting);
        }
        self.start_poller();
        let signals = self.signals.clone();
        let (ticket, delay) = self.scheduler.schedule(move |ticket| {
            let _ = signals.send(Signal::BackoffElapsed { ticket });
        });
        info!(ticket, delay_secs = delay.as_secs(), "reconnect scheduled");
    }

    fn on_reconnect_hint(&mut self, source: HintSource) {
        if !self.running {
            debug!(%source, "reconnect hint ignored, engine not running");
            return;
        }
        if self.transport_open {
            let sent = self
                .transport
                .as_ref()
                .map(|t| t.send(&self.config.heartbeat_payload));
            if let Some(Err(e)) = sent {
                warn!(%source, error = %e, "heartbeat send failed, reconnecting");
                self.reconnect_now();
            }
            return;
        }
        if self.transport.is_some() {
            debug!(%source, "reconnect hint ignored, attempt in flight");
            return;
        }
        info!(%source, "reconnecting on hint");
        self.reconnect_now();
    }

    fn send_log_preference(&self) {
        let frame = serde_json::json!({ "logs": self.log_delivery }).to_string();
        if let Some(Err(e)) = self.transport.as_ref().map(|t| t.send(&frame)) {
            debug!(error = %e, "log preference not delivered");
        }
    }

    // ── State application ────────────────────────────────────────────

    fn on_incoming(&mut self, raw: &str) {
        let Some(message) = PushMessage::parse(raw) else {
            debug!(len = raw.len(), "dropping unparseable push payload");
            return;
        };
        if let Some(devices) = message.devices {
            self.store.apply_devices(devices);
        }
        if let Some(positions) = message.positions {
            self.store.apply_positions(positions);
        }
        if let Some(events) = message.events {
            self.process_events(&events);
        }
        if let Some(logs) = message.logs {
            self.store.append_logs(logs);
        }
    }

    fn process_events(&mut self, events: &[Event]) {
        if self.fanout.preferences().events_disabled || events.is_empty() {
            return;
        }
        self.store.apply_events(events);
        let outcome = self.fanout.process(events, &self.store);
        if outcome.audible {
            // No subscribers is fine.
            let _ = self.alerts.send(Alert::Audible {
                event_types: outcome.audible_types,
            });
        }
        self.store.push_notifications(outcome.notifications);
    }

    // ── Async work ───────────────────────────────────────────────────

    /// Start a full refresh. Results are upserts, so every completion is
    /// applied, including ones overtaken by a newer request.
    fn request_refresh(&mut self) {
        self.refreshes_in_flight += 1;
        let source = self.source.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let result = source.fetch_snapshot().await;
            let _ = signals.send(Signal::RefreshCompleted(result));
        });
    }

    fn on_refresh_completed(&mut self, result: Result<Snapshot, CoreError>) {
        self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
        match result {
            Ok(snapshot) => self.store.apply_snapshot(snapshot),
            Err(e) => warn!(error = %e, "full refresh failed, waiting for next cycle"),
        }
    }

    fn fetch_event(&self, id: i64) {
        let source = self.source.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let result = source.fetch_event(id).await;
            let _ = signals.send(Signal::EventFetched(result));
        });
    }

    fn start_poller(&mut self) {
        let signals = self.signals.clone();
        self.poller.start(self.config.poll_interval, move || {
            let _ = signals.send(Signal::PollTick);
        });
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!(from = %current, to = %status, "connection status");
            *current = status;
            true
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────
