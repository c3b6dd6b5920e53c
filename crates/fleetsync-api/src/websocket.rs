//! Push socket transport.
//!
//! Owns exactly one WebSocket connection and reports its lifecycle through
//! a callback: opened, message received, transport error, closed with a
//! code. It knows nothing about what the messages mean or when to
//! reconnect; that is the sync engine's job.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetsync_api::websocket::{TransportEvent, WebSocketHandle};
//! use url::Url;
//!
//! let url = Url::parse("wss://fleet.example.com/api/socket")?;
//! let handle = WebSocketHandle::open(url, Vec::new(), |event| match event {
//!     TransportEvent::Message(text) => println!("{text}"),
//!     other => println!("{other:?}"),
//! });
//!
//! handle.send(r#"{"logs":true}"#)?;
//! handle.close();
//! ```

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer sent a close frame without a payload.
pub const NO_STATUS_RECEIVED: u16 = 1005;

// ── TransportEvent ───────────────────────────────────────────────────

/// Lifecycle callbacks of a single socket connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; frames can now be sent.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// Transport-level error. Advisory: a `Closed` may or may not follow.
    Error(String),
    /// The connection is gone. Always the last callback of a connection.
    Closed { code: u16, reason: String },
}

type EventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to one running socket connection.
///
/// Dropping the handle ends the connection with a normal close. After an
/// explicit [`close`](Self::close), no further callbacks fire.
pub struct WebSocketHandle {
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connection task and return immediately.
    ///
    /// `headers` are added to the upgrade request (session cookie,
    /// `Authorization`). The handshake happens asynchronously; success is
    /// reported as [`TransportEvent::Opened`].
    pub fn open<F>(url: Url, headers: Vec<(String, String)>, on_event: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let on_event: EventCallback = Arc::new(on_event);
        tokio::spawn(async move {
            run(url, headers, outgoing_rx, task_cancel, on_event).await;
        });

        Self { outgoing, cancel }
    }

    /// Queue a text frame.
    ///
    /// Fails once the connection task has finished or the handle was
    /// closed. Success only means the frame was queued.
    pub fn send(&self, text: impl Into<String>) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::WebSocketClosed {
                code: 1000,
                reason: "closed by client".into(),
            });
        }
        self.outgoing
            .send(text.into())
            .map_err(|_| Error::WebSocketClosed {
                code: ABNORMAL_CLOSURE,
                reason: "connection task finished".into(),
            })
    }

    /// Close the connection. Idempotent; suppresses all later callbacks.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outgoing.is_closed()
    }
}

// ── Connection task ──────────────────────────────────────────────────

async fn run(
    url: Url,
    headers: Vec<(String, String)>,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    on_event: EventCallback,
) {
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        outcome = connect_and_read(&url, &headers, &mut outgoing_rx, &on_event) => outcome,
    };

    // A close() that raced the end of the connection still wins.
    if cancel.is_cancelled() {
        tracing::debug!("socket closed by client");
        return;
    }

    match outcome {
        Ok((code, reason)) => {
            tracing::info!(code, reason = %reason, "socket closed");
            on_event(TransportEvent::Closed { code, reason });
        }
        Err(e) => {
            tracing::warn!(error = %e, "socket failed");
            let reason = e.to_string();
            on_event(TransportEvent::Error(reason.clone()));
            on_event(TransportEvent::Closed {
                code: ABNORMAL_CLOSURE,
                reason,
            });
        }
    }
}

/// Establish a single connection and pump frames until it drops.
///
/// Returns the close code and reason on an orderly end of stream.
async fn connect_and_read(
    url: &Url,
    headers: &[(String, String)],
    outgoing_rx: &mut mpsc::UnboundedReceiver<String>,
    on_event: &EventCallback,
) -> Result<(u16, String), Error> {
    tracing::info!(url = %url, "connecting socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    for (name, value) in headers {
        request = request.with_header(name.as_str(), value.as_str());
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("socket connected");
    on_event(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                // The handle owns the sender, so `None` means it was dropped.
                let Some(text) = outgoing else {
                    let _ = write.close().await;
                    return Ok((1000, "handle dropped".into()));
                };
                write
                    .send(tungstenite::Message::Text(text.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        on_event(TransportEvent::Message(text.to_string()));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong itself
                        tracing::trace!("socket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return Ok(frame.map_or_else(
                            || (NO_STATUS_RECEIVED, String::new()),
                            |cf| (u16::from(cf.code), cf.reason.to_string()),
                        ));
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("socket stream ended without close frame");
                        return Ok((ABNORMAL_CLOSURE, "stream ended".into()));
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
