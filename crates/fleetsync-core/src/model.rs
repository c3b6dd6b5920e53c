// ── Domain model ──
//
// Wire records (devices, positions, events) come straight from
// fleetsync-api; this module adds the engine-owned types: connection
// status, UI notifications and alert notices.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use fleetsync_api::model::{Attributes, Device, DeviceStatus, Event, Position};

// ── ConnectionStatus ─────────────────────────────────────────────────

/// Status of the push connection. Owned by the connection state machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting,
    Offline,
    Error,
}

// ── Notifications ────────────────────────────────────────────────────

/// What the UI may do when a notification is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationAction {
    /// Focus the given device (map, detail panel).
    ShowDevice { device_id: i64 },
}

/// Ephemeral, UI-facing notification produced by the event fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    /// Stable id; repeated delivery of the same event yields the same id.
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub action: Option<NotificationAction>,
    pub show: bool,
}

impl NotificationItem {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            action: None,
            show: true,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

// ── Alerts ───────────────────────────────────────────────────────────

/// Discrete notices broadcast to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Play the alarm sound once. Carries the event types that matched.
    Audible { event_types: Vec<String> },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn connection_status_renders_lowercase() {
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(
            ConnectionStatus::from_str("live").unwrap(),
            ConnectionStatus::Live
        );
    }

    #[test]
    fn notification_defaults_to_visible_without_action() {
        let item = NotificationItem::new("event-1", "Geofence entered");
        assert!(item.show);
        assert!(item.action.is_none());

        let item = item.with_action(NotificationAction::ShowDevice { device_id: 4 });
        assert_eq!(
            item.action,
            Some(NotificationAction::ShowDevice { device_id: 4 })
        );
    }
}
