// ── Generic reactive entity collection ──
//
// Concurrent storage keyed by the server's integer ids, with push-based
// change notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for a single entity type.
///
/// Uses `DashMap` for O(1) lookups and a `watch` channel carrying a full,
/// id-ordered snapshot. Every mutation rebuilds the snapshot once, however
/// many entities it touched. With a capacity set, the lowest ids are
/// evicted once the collection grows past it.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    by_id: DashMap<i64, Arc<T>>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,

    capacity: Option<usize>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            snapshot,
            capacity: None,
        }
    }

    /// A collection that keeps at most `capacity` entities, newest ids first.
    pub(crate) fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Insert or replace a batch, publishing a single snapshot.
    ///
    /// Ids absent from `items` are left untouched unless the capacity
    /// evicts them. Returns how many ids were new.
    pub(crate) fn upsert_many(&self, items: impl IntoIterator<Item = (i64, T)>) -> usize {
        let mut inserted = 0;
        let mut touched = false;
        for (id, entity) in items {
            touched = true;
            if self.by_id.insert(id, Arc::new(entity)).is_none() {
                inserted += 1;
            }
        }
        if touched {
            self.evict_overflow();
            self.rebuild_snapshot();
        }
        inserted
    }

    pub(crate) fn get(&self, id: i64) -> Option<Arc<T>> {
        self.by_id.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn evict_overflow(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        let overflow = self.by_id.len().saturating_sub(capacity);
        if overflow == 0 {
            return;
        }
        let mut ids: Vec<i64> = self.by_id.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        for id in ids.into_iter().take(overflow) {
            self.by_id.remove(&id);
        }
    }

    /// Collect all values, ordered by id, and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(i64, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
