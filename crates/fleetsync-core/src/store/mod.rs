// ── Reactive data store ──
//
// Lock-free entity storage with push-based change notification.

mod collection;
mod data_store;
mod refresh;

pub use data_store::{DEFAULT_MAX_EVENTS, DEFAULT_MAX_LOG_LINES, DataStore};
pub use refresh::Snapshot;
