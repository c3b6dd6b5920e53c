// ── Status projection ──
//
// Connection status plus freshness of the newest fix, folded into one
// label for UI indicators. Pure: the caller supplies `now`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use strum::Display;

use crate::model::ConnectionStatus;

/// Seconds after which a fix reads as `Delayed` while live.
pub const DELAYED_AFTER_SECS: i64 = 15;

/// Seconds after which a fix reads as `Offline` while live.
pub const OFFLINE_AFTER_SECS: i64 = 120;

/// Label shown by status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DisplayStatus {
    Connecting,
    Reconnecting,
    Error,
    Offline,
    Delayed,
    Live,
}

impl DisplayStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Delayed => "delayed",
            Self::Live => "live",
        }
    }
}

/// Fold connection status and the newest fix time into a display label.
///
/// Transitional statuses pass through unchanged. When the push channel is
/// not open the result is `Offline`. Otherwise the age of `last_fix`
/// decides; with no fix at all the channel being open counts as live.
pub fn compute_status(
    status: ConnectionStatus,
    last_fix: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DisplayStatus {
    match status {
        ConnectionStatus::Connecting => DisplayStatus::Connecting,
        ConnectionStatus::Reconnecting => DisplayStatus::Reconnecting,
        ConnectionStatus::Error => DisplayStatus::Error,
        ConnectionStatus::Offline => DisplayStatus::Offline,
        ConnectionStatus::Live => {
            let Some(fix) = last_fix else {
                return DisplayStatus::Live;
            };
            let age = now - fix;
            if age > TimeDelta::seconds(OFFLINE_AFTER_SECS) {
                DisplayStatus::Offline
            } else if age > TimeDelta::seconds(DELAYED_AFTER_SECS) {
                DisplayStatus::Delayed
            } else {
                DisplayStatus::Live
            }
        }
    }
}
