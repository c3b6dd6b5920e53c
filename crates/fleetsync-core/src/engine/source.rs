// ── Engine collaborators ──
//
// The REST side (full refresh, single-event lookup) and the push side
// (transport factory) as traits, so the state machine can be driven by
// the real client in production and by scripted fakes in tests.

use std::future::Future;

use fleetsync_api::websocket::{TransportEvent, WebSocketHandle};
use fleetsync_api::FleetClient;
use url::Url;

use crate::error::CoreError;
use crate::model::Event;
use crate::store::Snapshot;

// ── FleetSource ──────────────────────────────────────────────────────

/// REST collaborator: full refreshes and single-event lookups.
pub trait FleetSource: Clone + Send + Sync + 'static {
    /// Fetch the complete device list and position list together.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, CoreError>> + Send;

    fn fetch_event(&self, id: i64) -> impl Future<Output = Result<Event, CoreError>> + Send;
}

impl FleetSource for FleetClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, CoreError> {
        let (devices, positions) = tokio::try_join!(self.list_devices(), self.list_positions())?;
        Ok(Snapshot { devices, positions })
    }

    async fn fetch_event(&self, id: i64) -> Result<Event, CoreError> {
        self.get_event(id).await.map_err(|e| {
            if e.is_not_found() {
                CoreError::EventNotFound { id }
            } else {
                CoreError::from(e)
            }
        })
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// One live push connection, as seen by the engine.
pub trait Transport: Send {
    /// Queue a text frame. An error means the connection is gone.
    fn send(&self, text: &str) -> Result<(), CoreError>;

    /// Close the connection. After this no lifecycle callbacks arrive.
    fn close(&self);
}

/// Factory for push connections.
pub trait Connector: Send + 'static {
    type Transport: Transport;

    /// Begin connecting and return at once; progress is reported through
    /// `on_event`.
    fn connect<F>(&self, on_event: F) -> Self::Transport
    where
        F: Fn(TransportEvent) + Send + Sync + 'static;
}

impl Transport for WebSocketHandle {
    fn send(&self, text: &str) -> Result<(), CoreError> {
        WebSocketHandle::send(self, text).map_err(CoreError::from)
    }

    fn close(&self) {
        WebSocketHandle::close(self);
    }
}

/// Production connector: a WebSocket to the server's push endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
    headers: Vec<(String, String)>,
}

impl WebSocketConnector {
    pub fn new(url: Url, headers: Vec<(String, String)>) -> Self {
        Self { url, headers }
    }

    /// Derive the socket URL and auth headers from a REST client.
    pub fn from_client(client: &FleetClient) -> Result<Self, CoreError> {
        Ok(Self::new(client.socket_url()?, client.socket_headers()))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketHandle;

    fn connect<F>(&self, on_event: F) -> WebSocketHandle
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        WebSocketHandle::open(self.url.clone(), self.headers.clone(), on_event)
    }
}
