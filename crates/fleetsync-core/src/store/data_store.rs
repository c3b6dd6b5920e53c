// ── Central reactive data store ──
//
// Shared application state written only by the sync engine and read by
// everyone else. Mutations are broadcast to subscribers via `watch`
// channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Device, Event, NotificationItem, Position};

/// Default capacity of the server log ring.
pub const DEFAULT_MAX_LOG_LINES: usize = 500;

/// Default number of events kept, newest ids first.
pub const DEFAULT_MAX_EVENTS: usize = 200;

/// Central reactive store for devices, positions, events, server log lines
/// and UI notifications.
///
/// Positions are keyed by device id and hold only the latest fix. Events
/// are a bounded recent history.
pub struct DataStore {
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) positions: EntityCollection<Position>,
    pub(crate) events: EntityCollection<Event>,
    pub(crate) logs: watch::Sender<Arc<Vec<String>>>,
    pub(crate) max_log_lines: usize,
    notifications: watch::Sender<Arc<Vec<NotificationItem>>>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_push: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_LOG_LINES, DEFAULT_MAX_EVENTS)
    }

    /// A store keeping at most `max_log_lines` log lines and `max_events`
    /// events.
    pub fn with_limits(max_log_lines: usize, max_events: usize) -> Self {
        let (logs, _) = watch::channel(Arc::new(Vec::new()));
        let (notifications, _) = watch::channel(Arc::new(Vec::new()));
        let (last_full_refresh, _) = watch::channel(None);
        let (last_push, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            positions: EntityCollection::new(),
            events: EntityCollection::bounded(max_events),
            logs,
            max_log_lines,
            notifications,
            last_full_refresh,
            last_push,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn positions_snapshot(&self) -> Arc<Vec<Arc<Position>>> {
        self.positions.snapshot()
    }

    pub fn logs_snapshot(&self) -> Arc<Vec<String>> {
        self.logs.borrow().clone()
    }

    /// Current notifications, most recent first.
    pub fn notifications_snapshot(&self) -> Arc<Vec<NotificationItem>> {
        self.notifications.borrow().clone()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn device(&self, id: i64) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    /// Latest position of a device.
    pub fn position(&self, device_id: i64) -> Option<Arc<Position>> {
        self.positions.get(device_id)
    }

    pub fn event(&self, id: i64) -> Option<Arc<Event>> {
        self.events.get(id)
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // ── Freshness ────────────────────────────────────────────────────

    /// Most recent fix time across all devices.
    pub fn latest_fix_time(&self) -> Option<DateTime<Utc>> {
        self.positions
            .snapshot()
            .iter()
            .filter_map(|p| p.fix_time)
            .max()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_push(&self) -> Option<DateTime<Utc>> {
        *self.last_push.borrow()
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Prepend a batch of notifications, keeping the batch's order.
    ///
    /// An existing entry with the same id is replaced by the new one (which
    /// moves to the front). Duplicate ids inside the batch keep the first.
    pub fn push_notifications(&self, items: Vec<NotificationItem>) {
        if items.is_empty() {
            return;
        }
        self.notifications.send_modify(|current| {
            let mut merged: Vec<NotificationItem> = Vec::with_capacity(items.len() + current.len());
            for item in items {
                if !merged.iter().any(|m| m.id == item.id) {
                    merged.push(item);
                }
            }
            let kept: Vec<NotificationItem> = current
                .iter()
                .filter(|old| !merged.iter().any(|m| m.id == old.id))
                .cloned()
                .collect();
            merged.extend(kept);
            *current = Arc::new(merged);
        });
    }

    /// Remove one notification. Returns `true` if it was present.
    pub fn dismiss_notification(&self, id: &str) -> bool {
        self.notifications.send_if_modified(|current| {
            if !current.iter().any(|n| n.id == id) {
                return false;
            }
            *current = Arc::new(current.iter().filter(|n| n.id != id).cloned().collect());
            true
        })
    }

    pub fn clear_notifications(&self) {
        self.notifications.send_if_modified(|current| {
            if current.is_empty() {
                return false;
            }
            *current = Arc::new(Vec::new());
            true
        });
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_logs(&self) -> watch::Receiver<Arc<Vec<String>>> {
        self.logs.subscribe()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Arc<Vec<NotificationItem>>> {
        self.notifications.subscribe()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ids(store: &DataStore) -> Vec<String> {
        store
            .notifications_snapshot()
            .iter()
            .map(|n| n.id.clone())
            .collect()
    }

    #[test]
    fn new_store_is_empty() {
        let store = DataStore::new();
        assert_eq!(store.device_count(), 0);
        assert_eq!(store.position_count(), 0);
        assert!(store.latest_fix_time().is_none());
        assert!(store.last_full_refresh().is_none());
        assert!(store.notifications_snapshot().is_empty());
    }

    #[test]
    fn notifications_are_prepended_as_a_block() {
        let store = DataStore::new();
        store.push_notifications(vec![NotificationItem::new("a", "first")]);
        store.push_notifications(vec![
            NotificationItem::new("b", "second"),
            NotificationItem::new("c", "third"),
        ]);
        assert_eq!(ids(&store), vec!["b", "c", "a"]);
    }

    #[test]
    fn repeated_id_replaces_existing_entry() {
        let store = DataStore::new();
        store.push_notifications(vec![
            NotificationItem::new("a", "old"),
            NotificationItem::new("b", "other"),
        ]);
        store.push_notifications(vec![
            NotificationItem::new("a", "new"),
            NotificationItem::new("a", "dup in batch"),
        ]);

        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(store.notifications_snapshot()[0].message, "new");
    }

    #[test]
    fn dismiss_and_clear() {
        let store = DataStore::new();
        store.push_notifications(vec![
            NotificationItem::new("a", "x"),
            NotificationItem::new("b", "y"),
        ]);
        assert!(store.dismiss_notification("a"));
        assert!(!store.dismiss_notification("a"));
        assert_eq!(ids(&store), vec!["b"]);

        store.clear_notifications();
        assert!(store.notifications_snapshot().is_empty());
    }

    #[test]
    fn pushing_over_existing_entries_keeps_older_ones_after_the_batch() {
        let store = DataStore::new();
        store.push_notifications(vec![
            NotificationItem::new("a", "1"),
            NotificationItem::new("b", "2"),
            NotificationItem::new("c", "3"),
        ]);
        store.push_notifications(vec![NotificationItem::new("b", "2 again")]);

        assert_eq!(ids(&store), vec!["b", "a", "c"]);
        assert_eq!(store.notifications_snapshot()[0].message, "2 again");
    }

    #[test]
    fn notification_subscribers_see_changes() {
        let store = DataStore::new();
        let mut rx = store.subscribe_notifications();
        store.push_notifications(vec![NotificationItem::new("a", "x")]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.dismiss_notification("missing");
        assert!(!rx.has_changed().unwrap());
    }
}
