// ── Core error types ──
//
// Errors from fleetsync-core. The engine itself never returns these
// across its public boundary; they travel inside signals (failed
// refreshes, failed event lookups) and end up in log lines. Consumers
// that call the REST collaborator directly (the CLI snapshot command)
// see them as values.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach server: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Session expired or not authenticated")]
    Unauthorized,

    #[error("Push channel closed (code {code}): {reason}")]
    ChannelClosed { code: u16, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Event not found: {id}")]
    EventNotFound { id: i64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the next natural cycle (poll tick, reconnect) may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Unauthorized | Self::Config { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetsync_api::Error> for CoreError {
    fn from(err: fleetsync_api::Error) -> Self {
        match err {
            fleetsync_api::Error::Unauthorized => CoreError::Unauthorized,
            fleetsync_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            fleetsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            fleetsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            fleetsync_api::Error::Http { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            fleetsync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("push channel: {reason}"),
            },
            fleetsync_api::Error::WebSocketClosed { code, reason } => {
                CoreError::ChannelClosed { code, reason }
            }
            fleetsync_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_through() {
        let err = CoreError::from(fleetsync_api::Error::Unauthorized);
        assert!(matches!(err, CoreError::Unauthorized));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn http_status_is_kept() {
        let err = CoreError::from(fleetsync_api::Error::Http {
            status: 502,
            body: "bad gateway".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(502), .. }));
        assert!(err.is_recoverable());
    }
}
