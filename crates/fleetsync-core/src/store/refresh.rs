// ── State application ──
//
// Every write path into the DataStore. Full refreshes and push messages
// both land here; all of them upsert whole records and none of them ever
// delete an entry that is merely absent from the incoming data. The only
// removals are the bounded log ring and event history dropping their
// oldest entries.

use std::sync::Arc;

use chrono::Utc;

use super::DataStore;
use crate::model::{Device, Event, Position};

/// Devices and positions fetched together in one full refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub devices: Vec<Device>,
    pub positions: Vec<Position>,
}

impl DataStore {
    /// Apply a full refresh: upsert every device and position.
    ///
    /// Entries missing from the snapshot are left as they are.
    pub fn apply_snapshot(&self, snap: Snapshot) {
        let devices = snap.devices.len();
        let positions = snap.positions.len();
        self.upsert_devices(snap.devices);
        self.upsert_positions(snap.positions);
        self.last_full_refresh.send_replace(Some(Utc::now()));
        tracing::debug!(devices, positions, "full refresh applied");
    }

    /// Apply a partial device update from the push channel.
    pub fn apply_devices(&self, devices: Vec<Device>) {
        self.upsert_devices(devices);
        self.touch_push();
    }

    /// Apply a partial position update; each record replaces the device's
    /// previous position wholesale.
    pub fn apply_positions(&self, positions: Vec<Position>) {
        self.upsert_positions(positions);
        self.touch_push();
    }

    /// Record events. Events without an id are not stored; past the event
    /// capacity the lowest ids are dropped.
    pub fn apply_events(&self, events: &[Event]) {
        let keyed: Vec<(i64, Event)> = events
            .iter()
            .filter_map(|e| e.id.map(|id| (id, e.clone())))
            .collect();
        let skipped = events.len() - keyed.len();
        if skipped > 0 {
            tracing::debug!(skipped, "events without id not stored");
        }
        self.events.upsert_many(keyed);
        self.touch_push();
    }

    /// Append raw server log lines, dropping the oldest beyond capacity.
    pub fn append_logs(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let cap = self.max_log_lines;
        self.logs.send_modify(|current| {
            let mut next: Vec<String> = current.iter().cloned().chain(lines).collect();
            if next.len() > cap {
                next.drain(..next.len() - cap);
            }
            *current = Arc::new(next);
        });
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn upsert_devices(&self, devices: Vec<Device>) {
        self.devices
            .upsert_many(devices.into_iter().map(|d| (d.id, d)));
    }

    fn upsert_positions(&self, positions: Vec<Position>) {
        self.positions
            .upsert_many(positions.into_iter().map(|p| (p.device_id, p)));
    }

    fn touch_push(&self) {
        self.last_push.send_replace(Some(Utc::now()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn device(id: i64, name: &str) -> Device {
        serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
    }

    fn position(device_id: i64, speed: f64, fix_secs: i64) -> Position {
        let mut p: Position = serde_json::from_value(json!({ "deviceId": device_id })).unwrap();
        p.speed = speed;
        p.fix_time = Some(Utc.timestamp_opt(fix_secs, 0).unwrap());
        p
    }

    #[test]
    fn snapshot_upserts_without_deleting() {
        let store = DataStore::new();
        store.apply_snapshot(Snapshot {
            devices: vec![device(1, "Truck"), device(2, "Van")],
            positions: vec![position(1, 10.0, 100)],
        });
        store.apply_snapshot(Snapshot {
            devices: vec![device(1, "Truck renamed")],
            positions: Vec::new(),
        });

        assert_eq!(store.device_count(), 2);
        assert_eq!(store.device(1).unwrap().name, "Truck renamed");
        assert_eq!(store.device(2).unwrap().name, "Van");
        assert!(store.position(1).is_some());
        assert!(store.last_full_refresh().is_some());
    }

    #[test]
    fn position_replaced_wholesale_per_device() {
        let store = DataStore::new();
        let mut first = position(7, 30.0, 100);
        first
            .attributes
            .insert("ignition".into(), serde_json::Value::Bool(true));
        store.apply_positions(vec![first]);
        store.apply_positions(vec![position(7, 0.0, 200)]);

        let latest = store.position(7).unwrap();
        assert!(latest.speed.abs() < f64::EPSILON);
        assert_eq!(latest.ignition(), None);
        assert_eq!(store.position_count(), 1);
        assert!(store.last_push().is_some());
    }

    #[test]
    fn empty_update_leaves_positions_untouched() {
        let store = DataStore::new();
        store.apply_positions(vec![position(7, 5.0, 100)]);
        let before = store.positions_snapshot();

        store.apply_positions(Vec::new());

        assert_eq!(*store.positions_snapshot(), *before);
    }

    #[test]
    fn latest_fix_time_is_the_maximum() {
        let store = DataStore::new();
        store.apply_positions(vec![position(1, 0.0, 300), position(2, 0.0, 500)]);
        assert_eq!(
            store.latest_fix_time(),
            Some(Utc.timestamp_opt(500, 0).unwrap())
        );
    }

    #[test]
    fn events_without_id_are_not_stored() {
        let store = DataStore::new();
        let events: Vec<Event> =
            serde_json::from_value(json!([{ "id": 4, "type": "alarm" }, { "type": "deviceOnline" }]))
                .unwrap();
        store.apply_events(&events);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.event(4).unwrap().event_type, "alarm");
    }

    #[test]
    fn event_history_stays_bounded() {
        let store = DataStore::with_limits(10, 50);
        for batch in 0..10 {
            let events: Vec<Event> = (0..20)
                .map(|i| {
                    serde_json::from_value(json!({ "id": batch * 20 + i, "type": "deviceMoving" }))
                        .unwrap()
                })
                .collect();
            store.apply_events(&events);
        }

        assert_eq!(store.event_count(), 50);
        assert!(store.event(149).is_none());
        assert!(store.event(150).is_some());
        assert!(store.event(199).is_some());
    }

    #[test]
    fn log_ring_drops_oldest() {
        let store = DataStore::with_limits(3, 10);
        store.append_logs(vec!["a".into(), "b".into()]);
        store.append_logs(vec!["c".into(), "d".into()]);
        assert_eq!(*store.logs_snapshot(), vec!["b", "c", "d"]);
    }
}
