//! Correlates download client jobs with grab history.

use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{TrackedDownload, TrackedDownloadState};
use super::store::TrackedDownloadStore;
use crate::download::client::DownloadClientItem;
use crate::download::models::DownloadProtocol;
use crate::history::{data_keys, HistoryEvent, HistoryEventType, HistoryStore};
use crate::library::LibraryStore;

pub struct TrackedDownloadService {
    store: Arc<TrackedDownloadStore>,
    history: Arc<dyn HistoryStore>,
    library: Arc<dyn LibraryStore>,
}

impl TrackedDownloadService {
    pub fn new(
        store: Arc<TrackedDownloadStore>,
        history: Arc<dyn HistoryStore>,
        library: Arc<dyn LibraryStore>,
    ) -> Self {
        Self {
            store,
            history,
            library,
        }
    }

    pub fn store(&self) -> &Arc<TrackedDownloadStore> {
        &self.store
    }

    /// Tracks a job reported by a client.
    ///
    /// Known jobs get their client item refreshed. New jobs are only tracked
    /// when history has a grab for them; their initial state is derived from
    /// the most recent history event so a restart doesn't re-import or
    /// re-fail anything.
    pub fn track_download(
        &self,
        client_name: &str,
        protocol: DownloadProtocol,
        item: DownloadClientItem,
    ) -> Result<Option<TrackedDownload>> {
        let download_id = item.download_id.clone();

        let refreshed = self.store.update(&download_id, |tracked| {
            tracked.item = item.clone();
            tracked.is_trackable = true;
            tracked.clone()
        });
        if refreshed.is_some() {
            return Ok(refreshed);
        }

        let history = self.history.find_by_download_id(&download_id)?;
        let grabs: Vec<&HistoryEvent> = history
            .iter()
            .filter(|e| e.event_type == HistoryEventType::Grabbed)
            .collect();
        let Some(latest_grab) = grabs.first() else {
            debug!("Ignoring '{}', not grabbed by us", item.title);
            return Ok(None);
        };

        let mut tracked = TrackedDownload::new(client_name, protocol, item);
        tracked.state = Self::state_from_history(&history);
        tracked.grabbed_quality = Some(latest_grab.quality);
        tracked.indexer = latest_grab
            .data_value(data_keys::INDEXER)
            .map(str::to_string);

        let media_ids: Vec<i64> = grabs
            .iter()
            .map(|e| e.media_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tracked.remote_media = self.library.get_media_many(&media_ids)?;

        info!(
            "Tracking '{}' ({}) as {}",
            tracked.item.title,
            download_id,
            tracked.state.as_str()
        );
        self.store.upsert(tracked.clone());
        Ok(Some(tracked))
    }

    fn state_from_history(history: &[HistoryEvent]) -> TrackedDownloadState {
        match history.first().map(|e| e.event_type) {
            Some(HistoryEventType::DownloadFolderImported) => TrackedDownloadState::Imported,
            Some(HistoryEventType::DownloadFailed) => TrackedDownloadState::Failed,
            _ => TrackedDownloadState::Downloading,
        }
    }

    pub fn find(&self, download_id: &str) -> Option<TrackedDownload> {
        self.store.get(download_id)
    }

    /// Flags jobs a client no longer reports. Untrackable jobs that already
    /// reached a terminal state are dropped.
    pub fn update_trackable(&self, client_name: &str, seen_ids: &BTreeSet<String>) {
        for tracked in self.store.all() {
            if tracked.client_name != client_name || seen_ids.contains(&tracked.download_id) {
                continue;
            }
            if tracked.state.is_terminal() {
                self.stop_tracking(&tracked.download_id);
            } else {
                self.store
                    .update(&tracked.download_id, |t| t.is_trackable = false);
            }
        }
    }

    pub fn stop_tracking(&self, download_id: &str) {
        if let Some(tracked) = self.store.remove(download_id) {
            debug!("Stopped tracking '{}'", tracked.item.title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::client::DownloadItemStatus;
    use crate::history::SqliteHistoryStore;
    use crate::library::{Media, SqliteLibraryStore};
    use crate::qualities::{Quality, QualityModel};
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    struct Fixture {
        service: TrackedDownloadService,
        history: Arc<SqliteHistoryStore>,
        media_id: i64,
    }

    fn fixture() -> Fixture {
        let history = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let library = Arc::new(SqliteLibraryStore::in_memory().unwrap());
        let media_id = library
            .add_media(&Media::new(0, "Movie", PathBuf::from("/library/Movie")))
            .unwrap();
        Fixture {
            service: TrackedDownloadService::new(
                Arc::new(TrackedDownloadStore::new()),
                history.clone(),
                library,
            ),
            history,
            media_id,
        }
    }

    fn record(fixture: &Fixture, event_type: HistoryEventType, minutes_ago: i64) {
        fixture
            .history
            .append(
                &HistoryEvent::new(event_type, fixture.media_id, "Movie.2020.1080p-GRP")
                    .with_download_id(Some("job".to_string()))
                    .with_quality(QualityModel::new(Quality::WebDl1080p))
                    .with_date(Utc::now() - Duration::minutes(minutes_ago))
                    .with_data(data_keys::INDEXER, "indexer-a"),
            )
            .unwrap();
    }

    fn item(status: DownloadItemStatus) -> DownloadClientItem {
        DownloadClientItem::new("job", "Movie.2020.1080p-GRP", status)
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let f = fixture();
        let tracked = f
            .service
            .track_download("c", DownloadProtocol::Usenet, item(DownloadItemStatus::Downloading))
            .unwrap();
        assert!(tracked.is_none());
        assert!(f.service.find("job").is_none());
    }

    #[test]
    fn test_grabbed_job_is_tracked_with_media() {
        let f = fixture();
        record(&f, HistoryEventType::Grabbed, 10);

        let tracked = f
            .service
            .track_download("c", DownloadProtocol::Usenet, item(DownloadItemStatus::Downloading))
            .unwrap()
            .unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::Downloading);
        assert_eq!(tracked.media_ids(), vec![f.media_id]);
        assert_eq!(tracked.indexer.as_deref(), Some("indexer-a"));
        assert_eq!(
            tracked.grabbed_quality.map(|q| q.quality),
            Some(Quality::WebDl1080p)
        );

        // Refresh keeps state, updates the item.
        let refreshed = f
            .service
            .track_download("c", DownloadProtocol::Usenet, item(DownloadItemStatus::Completed))
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.item.status, DownloadItemStatus::Completed);
    }

    #[test]
    fn test_initial_state_from_history() {
        let f = fixture();
        record(&f, HistoryEventType::Grabbed, 10);
        record(&f, HistoryEventType::DownloadFolderImported, 5);

        let tracked = f
            .service
            .track_download("c", DownloadProtocol::Usenet, item(DownloadItemStatus::Completed))
            .unwrap()
            .unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::Imported);
    }

    #[test]
    fn test_update_trackable() {
        let f = fixture();
        record(&f, HistoryEventType::Grabbed, 10);
        f.service
            .track_download("c", DownloadProtocol::Usenet, item(DownloadItemStatus::Downloading))
            .unwrap();

        f.service.update_trackable("c", &BTreeSet::new());
        assert!(!f.service.find("job").unwrap().is_trackable);

        f.service.store().update("job", |t| t.state = TrackedDownloadState::Failed);
        f.service.update_trackable("c", &BTreeSet::new());
        assert!(f.service.find("job").is_none());
    }
}
