//! Realtime synchronization engine between `fleetsync-api` and UI consumers.
//!
//! Keeps a local view of devices and positions consistent with a server
//! that pushes updates over a WebSocket, degrading to periodic polling
//! while the push channel is down:
//!
//! - **[`SyncEngine`]**: cheap-to-clone handle. [`start()`](SyncEngine::start)
//!   connects, [`stop()`](SyncEngine::stop) tears everything down, and
//!   [`notify_reconnect_hint()`](SyncEngine::notify_reconnect_hint) lets
//!   visibility, connectivity and user actions force a reconnect.
//!
//! - **[`ConnectionMachine`]**: the state machine behind the handle. All
//!   inputs are [`Signal`]s fed through one `dispatch`.
//!
//! - **[`DataStore`]**: lock-free reactive storage built on `DashMap` +
//!   `tokio::sync::watch`. Holds devices, latest positions, events, server
//!   log lines and UI notifications.
//!
//! - **[`EventFanout`]**: turns event batches into audible alerts and
//!   de-duplicated notifications.
//!
//! - **[`compute_status`]**: pure projection of connection status and fix
//!   freshness into a display label.

pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod model;
pub mod poller;
pub mod scheduler;
pub mod status;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use engine::{
    ConnectionMachine, Connector, FleetSource, HintSource, PushMessage, Signal, SyncEngine,
    Transport, WebSocketConnector,
};
pub use error::CoreError;
pub use fanout::{AlertPreferences, EventFanout, FanoutOutcome};
pub use poller::FallbackPoller;
pub use scheduler::ReconnectScheduler;
pub use status::{DisplayStatus, compute_status};
pub use store::{DataStore, Snapshot};

pub use model::{
    Alert, ConnectionStatus, Device, DeviceStatus, Event, NotificationAction, NotificationItem,
    Position,
};
