// Wire data model shared by the REST endpoints and the push socket.
//
// Field names follow the server's camelCase JSON. Unknown fields are
// tolerated and everything that isn't an identity key has a default,
// so partially populated records still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form attribute bag carried by devices, positions and events.
pub type Attributes = Map<String, Value>;

// ── Device ───────────────────────────────────────────────────────────

/// Connectivity status reported by the server for a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A tracked device, keyed by its integer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

// ── Position ─────────────────────────────────────────────────────────

/// Latest known fix for a device. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub id: Option<i64>,
    pub device_id: i64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    /// Speed in knots, as reported by the server.
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default)]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Position {
    pub fn ignition(&self) -> Option<bool> {
        self.attributes.get("ignition").and_then(Value::as_bool)
    }

    pub fn alarm(&self) -> Option<&str> {
        self.attributes.get("alarm").and_then(Value::as_str)
    }

    pub fn battery_level(&self) -> Option<f64> {
        self.attributes.get("batteryLevel").and_then(Value::as_f64)
    }
}

// ── Event ────────────────────────────────────────────────────────────

fn default_event_type() -> String {
    "unknown".into()
}

/// A discrete server event (alarm, geofence crossing, maintenance, ...).
///
/// Every field is optional on the wire: a record with nothing but a type
/// (or nothing at all) still deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(
        rename = "type",
        default = "default_event_type",
        deserialize_with = "event_type_or_unknown"
    )]
    pub event_type: String,
    #[serde(default)]
    pub device_id: Option<i64>,
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub position_id: Option<i64>,
    #[serde(default)]
    pub geofence_id: Option<i64>,
    #[serde(default)]
    pub maintenance_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Attributes,
}

impl Event {
    /// Salvage what can be read from a record that failed strict decoding.
    ///
    /// Ids accept numbers or numeric strings, a non-string type becomes
    /// `"unknown"` and a non-object attribute bag becomes empty. Returns
    /// `None` only when `value` is not a JSON object.
    pub fn from_value_lossy(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id_field = |key: &str| object.get(key).and_then(lossy_i64);
        Some(Self {
            id: id_field("id"),
            event_type: object
                .get("type")
                .and_then(Value::as_str)
                .map_or_else(default_event_type, str::to_owned),
            device_id: id_field("deviceId"),
            event_time: object
                .get("eventTime")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            position_id: id_field("positionId"),
            geofence_id: id_field("geofenceId"),
            maintenance_id: id_field("maintenanceId"),
            attributes: object
                .get("attributes")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// The human-readable `message` attribute, if the server attached one.
    pub fn message(&self) -> Option<&str> {
        self.attributes.get("message").and_then(Value::as_str)
    }

    /// Alarm subtype for `alarm` events (e.g. `"sos"`).
    pub fn alarm(&self) -> Option<&str> {
        self.attributes.get("alarm").and_then(Value::as_str)
    }
}

fn lossy_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn event_type_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_event_type))
}

// ── Server ───────────────────────────────────────────────────────────

/// Server-wide preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Server {
    /// Fallback-poll interval preference in seconds (`pollInterval`).
    ///
    /// Accepts a JSON number or a numeric string; non-positive values are
    /// treated as absent.
    pub fn poll_interval_secs(&self) -> Option<u64> {
        let value = self.attributes.get("pollInterval")?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|secs| *secs > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_status_falls_back_to_unknown() {
        let device: Device = serde_json::from_value(json!({
            "id": 3,
            "name": "Van 3",
            "status": "sleeping"
        }))
        .unwrap();
        assert_eq!(device.status, DeviceStatus::Unknown);
        assert_eq!(device.name, "Van 3");
    }

    #[test]
    fn position_reads_camel_case_and_attributes() {
        let position: Position = serde_json::from_value(json!({
            "deviceId": 7,
            "latitude": 52.1,
            "longitude": 4.3,
            "speed": 12.5,
            "fixTime": "2026-03-01T10:00:00Z",
            "attributes": { "ignition": true, "alarm": "sos", "batteryLevel": 81.0 }
        }))
        .unwrap();
        assert_eq!(position.device_id, 7);
        assert_eq!(position.ignition(), Some(true));
        assert_eq!(position.alarm(), Some("sos"));
        assert_eq!(position.battery_level(), Some(81.0));
        assert!(position.fix_time.is_some());
    }

    #[test]
    fn empty_event_deserializes_with_defaults() {
        let event: Event = serde_json::from_value(json!({})).unwrap();
        assert_eq!(event.event_type, "unknown");
        assert!(event.id.is_none());
        assert!(event.device_id.is_none());
        assert!(event.message().is_none());
    }

    #[test]
    fn null_type_and_attributes_fall_back_to_defaults() {
        let event: Event = serde_json::from_value(json!({
            "id": 5,
            "type": null,
            "deviceId": null,
            "attributes": null
        }))
        .unwrap();
        assert_eq!(event.id, Some(5));
        assert_eq!(event.event_type, "unknown");
        assert!(event.device_id.is_none());
        assert!(event.attributes.is_empty());
    }

    #[test]
    fn lossy_event_salvages_wrong_typed_fields() {
        let raw = json!({
            "id": "12",
            "type": 7,
            "deviceId": 3,
            "eventTime": "not a time",
            "attributes": ["not", "an", "object"]
        });
        assert!(serde_json::from_value::<Event>(raw.clone()).is_err());

        let event = Event::from_value_lossy(&raw).unwrap();
        assert_eq!(event.id, Some(12));
        assert_eq!(event.event_type, "unknown");
        assert_eq!(event.device_id, Some(3));
        assert!(event.event_time.is_none());
        assert!(event.attributes.is_empty());

        assert!(Event::from_value_lossy(&json!(42)).is_none());
    }

    #[test]
    fn event_exposes_alarm_and_message() {
        let event: Event = serde_json::from_value(json!({
            "id": 1,
            "type": "alarm",
            "deviceId": 4,
            "attributes": { "alarm": "sos", "message": "SOS pressed" }
        }))
        .unwrap();
        assert_eq!(event.alarm(), Some("sos"));
        assert_eq!(event.message(), Some("SOS pressed"));
    }

    #[test]
    fn server_poll_interval_accepts_numbers_and_strings() {
        let numeric: Server =
            serde_json::from_value(json!({ "attributes": { "pollInterval": 45 } })).unwrap();
        assert_eq!(numeric.poll_interval_secs(), Some(45));

        let text: Server =
            serde_json::from_value(json!({ "attributes": { "pollInterval": " 20 " } })).unwrap();
        assert_eq!(text.poll_interval_secs(), Some(20));

        let zero: Server =
            serde_json::from_value(json!({ "attributes": { "pollInterval": 0 } })).unwrap();
        assert_eq!(zero.poll_interval_secs(), None);
    }
}
