// Push payload decoding.
//
// A server message is a JSON object with any subset of `devices`,
// `positions`, `events` and `logs`. Decoding is lenient per element: one
// bad device or position is skipped, its siblings survive. Events are
// salvaged field by field instead, so a malformed one still reaches the
// fan-out.

use serde_json::Value;

use crate::model::{Device, Event, Position};

/// A decoded push message. `None` means the key was absent: no update for
/// that category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushMessage {
    pub devices: Option<Vec<Device>>,
    pub positions: Option<Vec<Position>>,
    pub events: Option<Vec<Event>>,
    pub logs: Option<Vec<String>>,
}

impl PushMessage {
    /// Decode a raw frame. Returns `None` for anything that is not a JSON
    /// object.
    pub fn parse(raw: &str) -> Option<Self> {
        let Value::Object(mut object) = serde_json::from_str::<Value>(raw).ok()? else {
            return None;
        };
        Some(Self {
            devices: object.remove("devices").map(decode_each),
            positions: object.remove("positions").map(decode_each),
            events: object.remove("events").map(decode_events),
            logs: object.remove("logs").map(decode_logs),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_none()
            && self.positions.is_none()
            && self.events.is_none()
            && self.logs.is_none()
    }
}

fn decode_each<T: serde::de::DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        tracing::debug!("push field is not an array, ignored");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed push record");
                None
            }
        })
        .collect()
}

fn decode_events(value: Value) -> Vec<Event> {
    let Value::Array(items) = value else {
        tracing::debug!("push events field is not an array, ignored");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Event>(item.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "malformed event, decoding leniently");
                Event::from_value_lossy(&item)
            }
        })
        .collect()
}

fn decode_logs(value: Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(line) => line,
            other => other.to_string(),
        })
        .collect()
}
