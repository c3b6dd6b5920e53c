// ── Engine configuration ──
//
// Tuning for the sync engine: poll cadence, backoff table, the logout
// close code and alert preferences. Built by the CLI (or any other host)
// and handed in; core never reads config files.

use std::time::Duration;

use fleetsync_api::Server;

use crate::fanout::AlertPreferences;
use crate::store::{DEFAULT_MAX_EVENTS, DEFAULT_MAX_LOG_LINES};

/// Fallback-poll interval used when neither the profile nor the server
/// sets one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Reconnect delays, in order. The last entry repeats.
pub const DEFAULT_BACKOFF_SECS: [u64; 6] = [1, 2, 5, 10, 20, 30];

/// Close code the server uses to end a session on logout.
pub const DEFAULT_LOGOUT_CLOSE_CODE: u16 = 4000;

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fallback-poll cadence while the push channel is down.
    pub poll_interval: Duration,
    /// Ascending reconnect delays; the cursor saturates on the last one.
    pub backoff: Vec<Duration>,
    /// Close code meaning "session ended on purpose": no reconnect, no poll.
    pub logout_close_code: u16,
    /// Heartbeat frame sent on an open socket to check liveness.
    pub heartbeat_payload: String,
    /// Capacity of the server log ring.
    pub max_log_lines: usize,
    /// How many events the store keeps, newest ids first.
    pub max_events: usize,
    pub alerts: AlertPreferences,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            logout_close_code: DEFAULT_LOGOUT_CLOSE_CODE,
            heartbeat_payload: "{}".into(),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            max_events: DEFAULT_MAX_EVENTS,
            alerts: AlertPreferences::default(),
        }
    }
}

impl EngineConfig {
    /// Let the server's `pollInterval` preference override the poll cadence.
    pub fn apply_server_preferences(&mut self, server: &Server) {
        if let Some(secs) = server.poll_interval_secs() {
            self.poll_interval = Duration::from_secs(secs);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_is_ascending() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff.first(), Some(&Duration::from_secs(1)));
        assert_eq!(config.backoff.last(), Some(&Duration::from_secs(30)));
        assert!(config.backoff.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn server_preference_overrides_poll_interval() {
        let mut config = EngineConfig::default();
        let server: Server =
            serde_json::from_value(serde_json::json!({ "attributes": { "pollInterval": 12 } }))
                .unwrap();
        config.apply_server_preferences(&server);
        assert_eq!(config.poll_interval, Duration::from_secs(12));
    }

    #[test]
    fn missing_server_preference_keeps_default() {
        let mut config = EngineConfig::default();
        config.apply_server_preferences(&Server::default());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
