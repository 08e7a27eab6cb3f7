//! Keyed arena of tracked downloads.
//!
//! All mutation goes through closures applied under the write lock, so a
//! read-modify-write on one id is atomic. [`TrackedDownloadStore::transition`]
//! only moves an item that is still in the expected source state; repeated or
//! overlapping calls are no-ops.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::models::{TrackedDownload, TrackedDownloadState};

#[derive(Default)]
pub struct TrackedDownloadStore {
    items: RwLock<HashMap<String, TrackedDownload>>,
}

impl TrackedDownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TrackedDownload>> {
        match self.items.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TrackedDownload>> {
        match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, download_id: &str) -> Option<TrackedDownload> {
        self.read().get(download_id).cloned()
    }

    pub fn all(&self) -> Vec<TrackedDownload> {
        let mut items: Vec<TrackedDownload> = self.read().values().cloned().collect();
        items.sort_by(|a, b| a.added.cmp(&b.added));
        items
    }

    pub fn in_state(&self, state: TrackedDownloadState) -> Vec<TrackedDownload> {
        self.all()
            .into_iter()
            .filter(|t| t.state == state)
            .collect()
    }

    pub fn upsert(&self, tracked: TrackedDownload) {
        self.write().insert(tracked.download_id.clone(), tracked);
    }

    /// Applies `f` to the item if present, returning its result.
    pub fn update<T>(&self, download_id: &str, f: impl FnOnce(&mut TrackedDownload) -> T) -> Option<T> {
        self.write().get_mut(download_id).map(f)
    }

    /// Moves `from` to `to`. Returns false, changing nothing, when the item
    /// is missing or not in `from`.
    pub fn transition(
        &self,
        download_id: &str,
        from: TrackedDownloadState,
        to: TrackedDownloadState,
    ) -> bool {
        self.update(download_id, |tracked| {
            if tracked.state != from {
                return false;
            }
            debug!(
                "{}: {} -> {}",
                tracked.item.title,
                from.as_str(),
                to.as_str()
            );
            tracked.state = to;
            true
        })
        .unwrap_or(false)
    }

    pub fn remove(&self, download_id: &str) -> Option<TrackedDownload> {
        self.write().remove(download_id)
    }
}
