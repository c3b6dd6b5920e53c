// ── Event fan-out ──
//
// Turns a batch of server events into at most one audible alert and a
// list of UI notifications. Every input degrades to some output; nothing
// here fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Event, NotificationAction, NotificationItem};
use crate::store::DataStore;

/// Event type of generic alarms; the subtype lives in `attributes.alarm`.
pub const ALARM_EVENT_TYPE: &str = "alarm";

/// Event type that gets a derived maintenance-due message.
pub const MAINTENANCE_EVENT_TYPE: &str = "maintenance";

/// User preferences governing alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPreferences {
    /// Event types that play the alarm sound.
    pub sound_events: Vec<String>,
    /// Alarm subtypes (`sos`, `overspeed`, ...) that play the alarm sound.
    pub sound_alarms: Vec<String>,
    /// Suppress event processing altogether.
    pub events_disabled: bool,
}

impl AlertPreferences {
    fn is_audible(&self, event: &Event) -> bool {
        if self.sound_events.iter().any(|t| *t == event.event_type) {
            return true;
        }
        event.event_type == ALARM_EVENT_TYPE
            && event
                .alarm()
                .is_some_and(|alarm| self.sound_alarms.iter().any(|a| a == alarm))
    }
}

/// Result of processing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutOutcome {
    /// Play the alarm sound (once for the whole batch).
    pub audible: bool,
    /// Types of the events that triggered the sound, in batch order.
    pub audible_types: Vec<String>,
    /// New notifications in batch order, ids unique.
    pub notifications: Vec<NotificationItem>,
}

/// Stateful fan-out stage. The only state is a sequence used for ids of
/// events that carry neither an id nor a device/time pair.
#[derive(Debug, Default)]
pub struct EventFanout {
    prefs: AlertPreferences,
    sequence: u64,
}

impl EventFanout {
    pub fn new(prefs: AlertPreferences) -> Self {
        Self { prefs, sequence: 0 }
    }

    pub fn preferences(&self) -> &AlertPreferences {
        &self.prefs
    }

    /// Classify a batch. `store` is read for vehicle names only.
    pub fn process(&mut self, events: &[Event], store: &DataStore) -> FanoutOutcome {
        let mut outcome = FanoutOutcome::default();
        if self.prefs.events_disabled || events.is_empty() {
            return outcome;
        }

        for event in events {
            if self.prefs.is_audible(event) && !outcome.audible_types.contains(&event.event_type) {
                outcome.audible_types.push(event.event_type.clone());
            }
        }
        outcome.audible = !outcome.audible_types.is_empty();

        for event in events {
            let item = if event.event_type == MAINTENANCE_EVENT_TYPE {
                Some(self.maintenance_notification(event, store))
            } else {
                self.generic_notification(event)
            };
            let Some(item) = item else { continue };
            if !outcome.notifications.iter().any(|n| n.id == item.id) {
                outcome.notifications.push(item);
            }
        }

        tracing::debug!(
            events = events.len(),
            notifications = outcome.notifications.len(),
            audible = outcome.audible,
            "event batch processed"
        );
        outcome
    }

    // ── Notification builders ────────────────────────────────────────

    fn generic_notification(&mut self, event: &Event) -> Option<NotificationItem> {
        let message = event.message()?.trim();
        if message.is_empty() {
            return None;
        }
        let id = self.stable_id("event", event);
        let item = NotificationItem::new(id, message);
        Some(match event.device_id {
            Some(device_id) => item.with_action(NotificationAction::ShowDevice { device_id }),
            None => item,
        })
    }

    fn maintenance_notification(&mut self, event: &Event, store: &DataStore) -> NotificationItem {
        let attrs = &event.attributes;
        let vehicle = vehicle_name(event.device_id, store);
        let name = ["maintenance", "name"]
            .iter()
            .find_map(|key| attrs.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Maintenance");
        let unit = attrs.get("unit").and_then(Value::as_str).unwrap_or("");
        let overdue = attrs.get("overdue").is_some_and(is_truthy);

        let mut message = if overdue {
            format!("{vehicle}: {name} is overdue")
        } else if let Some(remaining) = attrs.get("remaining").and_then(render_amount) {
            format!("{vehicle}: {name} due in {}", with_unit(&remaining, unit))
        } else {
            format!("{vehicle}: {name} due")
        };
        if let Some(target) = attrs.get("target").and_then(render_amount) {
            message.push_str(&format!(" (at {})", with_unit(&target, unit)));
        }

        let id = self.stable_id("maintenance", event);
        let item = NotificationItem::new(id, message);
        match event.device_id {
            Some(device_id) => item.with_action(NotificationAction::ShowDevice { device_id }),
            None => item,
        }
    }

    /// `{prefix}-{id}`, else `{prefix}-{device}-{millis}`, else a sequence.
    fn stable_id(&mut self, prefix: &str, event: &Event) -> String {
        if let Some(id) = event.id {
            return format!("{prefix}-{id}");
        }
        if let (Some(device_id), Some(time)) = (event.device_id, event.event_time) {
            return format!("{prefix}-{device_id}-{}", time.timestamp_millis());
        }
        self.sequence += 1;
        format!("{prefix}-anon-{}", self.sequence)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn vehicle_name(device_id: Option<i64>, store: &DataStore) -> String {
    let Some(id) = device_id else {
        return "Unknown vehicle".into();
    };
    store
        .device(id)
        .map(|d| d.name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Device {id}"))
}

fn render_amount(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => format!("{f:.1}"),
            (None, None) => n.to_string(),
        }),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

fn with_unit(amount: &str, unit: &str) -> String {
    if unit.is_empty() {
        amount.to_owned()
    } else {
        format!("{amount} {unit}")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        _ => false,
    }
}
