//! Completed-download handling:
//! `Downloading -> ImportPending -> Importing -> Imported | ImportFailed`.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{StatusMessage, TrackedDownload, TrackedDownloadState};
use super::store::TrackedDownloadStore;
use crate::download::client::DownloadItemStatus;
use crate::events::{
    DomainEvent, DownloadCompletedEvent, EventBus, ManualInteractionRequiredEvent,
};
use crate::history::{HistoryEventType, HistoryStore};
use crate::import::{DownloadedMediaImportService, ImportResult, ImportResultType};
use crate::library::LibraryStore;

pub struct CompletedDownloadService {
    store: Arc<TrackedDownloadStore>,
    history: Arc<dyn HistoryStore>,
    library: Arc<dyn LibraryStore>,
    importer: Arc<DownloadedMediaImportService>,
    events: Arc<EventBus>,
}

impl CompletedDownloadService {
    pub fn new(
        store: Arc<TrackedDownloadStore>,
        history: Arc<dyn HistoryStore>,
        library: Arc<dyn LibraryStore>,
        importer: Arc<DownloadedMediaImportService>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            history,
            library,
            importer,
            events,
        }
    }

    /// Moves a completed Downloading job to ImportPending. Problems with the
    /// job become warnings on it, not errors.
    pub fn check(&self, download_id: &str) -> Result<()> {
        let Some(tracked) = self.store.get(download_id) else {
            return Ok(());
        };
        if tracked.state != TrackedDownloadState::Downloading
            || tracked.item.status != DownloadItemStatus::Completed
        {
            return Ok(());
        }

        if tracked.remote_media.is_empty() && !self.resolve_media(&tracked)? {
            self.store.update(download_id, |t| {
                t.warn("Download wasn't grabbed by us or its media is gone, skipping")
            });
            return Ok(());
        }

        let output_path = tracked.item.output_path.trim();
        if output_path.is_empty() {
            self.store.update(download_id, |t| {
                t.warn("Download doesn't contain intermediate path, Skipping.")
            });
            return Ok(());
        }
        if !Path::new(output_path).is_absolute() {
            let message = format!(
                "[{}] is not a valid local path. You may need a Remote Path Mapping.",
                output_path
            );
            self.store.update(download_id, |t| t.warn(&message));
            return Ok(());
        }

        self.store.transition(
            download_id,
            TrackedDownloadState::Downloading,
            TrackedDownloadState::ImportPending,
        );
        Ok(())
    }

    /// Re-reads the grabbed media for a job that was tracked without any.
    fn resolve_media(&self, tracked: &TrackedDownload) -> Result<bool> {
        let mut media_ids: Vec<i64> = self
            .history
            .find_by_download_id_and_type(&tracked.download_id, HistoryEventType::Grabbed)?
            .iter()
            .map(|e| e.media_id)
            .collect();
        media_ids.sort_unstable();
        media_ids.dedup();
        if media_ids.is_empty() {
            return Ok(false);
        }

        let media = self.library.get_media_many(&media_ids)?;
        if media.is_empty() {
            return Ok(false);
        }
        self.store
            .update(&tracked.download_id, |t| t.remote_media = media);
        Ok(true)
    }

    /// Imports an ImportPending job. Only the caller that wins the move to
    /// Importing does any work.
    pub async fn import(&self, download_id: &str) -> Result<()> {
        if !self.store.transition(
            download_id,
            TrackedDownloadState::ImportPending,
            TrackedDownloadState::Importing,
        ) {
            return Ok(());
        }
        let Some(tracked) = self.store.get(download_id) else {
            return Ok(());
        };

        let output_path = Path::new(&tracked.item.output_path);
        let results = self
            .importer
            .process_path(
                output_path,
                Some(&tracked.item),
                Some(&tracked.client_name),
                &tracked.remote_media,
            )
            .await;

        let next = match self.evaluate(&tracked, &results) {
            Ok(next) => next,
            Err(e) => {
                self.store
                    .update(download_id, |t| t.state = TrackedDownloadState::ImportPending);
                return Err(e);
            }
        };
        self.store.update(download_id, |t| t.state = next);

        match next {
            TrackedDownloadState::Imported => {
                info!("'{}' imported", tracked.item.title);
                self.store.update(download_id, |t| t.status_messages.clear());
                self.events
                    .publish(DomainEvent::DownloadCompleted(DownloadCompletedEvent {
                        download_id: tracked.download_id.clone(),
                        title: tracked.item.title.clone(),
                        media_ids: tracked.media_ids(),
                    }));
            }
            TrackedDownloadState::ImportFailed => {
                let status_messages = Self::status_messages(&tracked, &results);
                let messages = status_messages
                    .iter()
                    .flat_map(|s| s.messages.iter().cloned())
                    .collect();
                self.store
                    .update(download_id, |t| t.warn_many(status_messages));
                self.events.publish(DomainEvent::ManualInteractionRequired(
                    ManualInteractionRequiredEvent {
                        download_id: tracked.download_id.clone(),
                        release_title: tracked.item.title.clone(),
                        media_ids: tracked.media_ids(),
                        messages,
                    },
                ));
            }
            _ => debug!(
                "'{}' partially imported, will retry",
                tracked.item.title
            ),
        }
        Ok(())
    }

    fn evaluate(
        &self,
        tracked: &TrackedDownload,
        results: &[ImportResult],
    ) -> Result<TrackedDownloadState> {
        let imported = results
            .iter()
            .filter(|r| r.result == ImportResultType::Imported)
            .count();

        if imported == 0 {
            return Ok(TrackedDownloadState::ImportFailed);
        }
        if imported >= Self::expected_imports(tracked) {
            return Ok(TrackedDownloadState::Imported);
        }

        // Files skipped as duplicates may already be in from an earlier pass.
        if self.all_media_imported(tracked)? {
            return Ok(TrackedDownloadState::Imported);
        }
        Ok(TrackedDownloadState::ImportPending)
    }

    /// `max(1, sum of monitored units)` over the job's media.
    fn expected_imports(tracked: &TrackedDownload) -> usize {
        let units: u32 = tracked
            .remote_media
            .iter()
            .map(|m| m.monitored_unit_count)
            .sum();
        units.max(1) as usize
    }

    fn all_media_imported(&self, tracked: &TrackedDownload) -> Result<bool> {
        let imports = self.history.find_by_download_id_and_type(
            &tracked.download_id,
            HistoryEventType::DownloadFolderImported,
        )?;
        Ok(!tracked.remote_media.is_empty()
            && tracked
                .remote_media
                .iter()
                .all(|m| imports.iter().any(|e| e.media_id == m.id)))
    }

    fn status_messages(tracked: &TrackedDownload, results: &[ImportResult]) -> Vec<StatusMessage> {
        if results.is_empty() {
            return vec![StatusMessage::new(
                &tracked.item.title,
                vec![format!(
                    "No files found are eligible for import in {}",
                    tracked.item.output_path
                )],
            )];
        }
        results
            .iter()
            .map(|r| StatusMessage::new(&r.decision.local.file_name(), r.errors.clone()))
            .collect()
    }

    /// Puts an ImportFailed job back in line for import.
    pub fn retry_import(&self, download_id: &str) -> bool {
        let moved = self.store.transition(
            download_id,
            TrackedDownloadState::ImportFailed,
            TrackedDownloadState::ImportPending,
        );
        if moved {
            self.store.update(download_id, |t| t.status_messages.clear());
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use crate::download::client::DownloadClientItem;
    use crate::download::models::DownloadProtocol;
    use crate::history::{HistoryEvent, HistoryRecorder, SqliteHistoryStore};
    use crate::import::{ImportDecisionMaker, ImportExecutor, LocalDiskProvider, NoMediaInfoReader};
    use crate::library::{Media, SqliteLibraryStore};
    use crate::qualities::{Quality, QualityModel};
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        dir: TempDir,
        service: CompletedDownloadService,
        store: Arc<TrackedDownloadStore>,
        history: Arc<SqliteHistoryStore>,
        events: Arc<EventBus>,
        media: Media,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TrackedDownloadStore::new());
        let history = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let library = Arc::new(SqliteLibraryStore::in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        events.register(Arc::new(HistoryRecorder::new(history.clone())));
        let disk = Arc::new(LocalDiskProvider::new());

        let mut media = Media::new(0, "Movie Title", dir.path().join("library/Movie Title"));
        media.runtime_minutes = 120;
        media.id = library.add_media(&media).unwrap();

        let settings = ImportSettings {
            skip_free_space_check: true,
            ..Default::default()
        };
        let importer = Arc::new(DownloadedMediaImportService::new(
            Arc::new(ImportDecisionMaker::new(
                history.clone(),
                library.clone(),
                disk.clone(),
                Arc::new(NoMediaInfoReader),
                settings,
            )),
            Arc::new(ImportExecutor::new(library.clone(), disk.clone(), events.clone())),
            disk,
        ));
        Fixture {
            service: CompletedDownloadService::new(
                store.clone(),
                history.clone(),
                library,
                importer,
                events.clone(),
            ),
            dir,
            store,
            history,
            events,
            media,
        }
    }

    fn grab(f: &Fixture) {
        f.history
            .append(
                &HistoryEvent::new(
                    HistoryEventType::Grabbed,
                    f.media.id,
                    "Movie.Title.2020.1080p.WEB-DL-GRP",
                )
                .with_download_id(Some("job".to_string()))
                .with_quality(QualityModel::new(Quality::WebDl1080p)),
            )
            .unwrap();
    }

    fn track(f: &Fixture, output_path: &str, with_media: bool) {
        let mut item = DownloadClientItem::new(
            "job",
            "Movie.Title.2020.1080p.WEB-DL-GRP",
            DownloadItemStatus::Completed,
        );
        item.output_path = output_path.to_string();
        let mut tracked = TrackedDownload::new("blackhole", DownloadProtocol::Usenet, item);
        if with_media {
            tracked.remote_media = vec![f.media.clone()];
        }
        f.store.upsert(tracked);
    }

    fn write_video(folder: &Path, name: &str) {
        std::fs::create_dir_all(folder).unwrap();
        let file = std::fs::File::create(folder.join(name)).unwrap();
        file.set_len(80 * 1024 * 1024).unwrap();
    }

    #[test]
    fn test_empty_output_path_stays_downloading() {
        let f = fixture();
        track(&f, "", true);

        f.service.check("job").unwrap();

        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::Downloading);
        assert_eq!(
            tracked.status_messages[0].messages[0],
            "Download doesn't contain intermediate path, Skipping."
        );
    }

    #[test]
    fn test_relative_output_path_is_a_warning() {
        let f = fixture();
        track(&f, "downloads/movie", true);

        f.service.check("job").unwrap();

        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::Downloading);
        assert!(tracked.status_messages[0].messages[0].contains("not a valid local path"));
    }

    #[test]
    fn test_media_resolved_from_history() {
        let f = fixture();
        grab(&f);
        track(&f, "/downloads/movie", false);

        f.service.check("job").unwrap();

        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::ImportPending);
        assert_eq!(tracked.media_ids(), vec![f.media.id]);
    }

    #[test]
    fn test_unknown_media_stays_downloading() {
        let f = fixture();
        track(&f, "/downloads/movie", false);

        f.service.check("job").unwrap();
        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::Downloading);
    }

    #[tokio::test]
    async fn test_successful_import() {
        let f = fixture();
        grab(&f);
        let folder = f.dir.path().join("downloads/Movie.Title.2020.1080p.WEB-DL-GRP");
        write_video(&folder, "Movie.Title.2020.1080p.WEB-DL-GRP.mkv");
        track(&f, &folder.to_string_lossy(), true);
        let mut rx = f.events.subscribe();

        f.service.check("job").unwrap();
        f.service.import("job").await.unwrap();

        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::Imported);
        assert!(f.history.is_download_imported("job").unwrap());

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["MediaImported", "DownloadCompleted"]);

        // A second import is a no-op.
        f.service.import("job").await.unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_all_rejected_requires_manual_interaction() {
        let f = fixture();
        grab(&f);
        let folder = f.dir.path().join("downloads/Movie.Title.2020.1080p.WEB-DL-GRP");
        std::fs::create_dir_all(&folder).unwrap();
        // Tiny file without media info is a sample.
        std::fs::write(folder.join("Movie.Title.2020.1080p.WEB-DL-GRP.mkv"), b"tiny").unwrap();
        track(&f, &folder.to_string_lossy(), true);
        let mut rx = f.events.subscribe();

        f.service.check("job").unwrap();
        f.service.import("job").await.unwrap();

        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::ImportFailed);
        assert_eq!(tracked.status_messages.len(), 1);
        assert_eq!(
            tracked.status_messages[0].title,
            "Movie.Title.2020.1080p.WEB-DL-GRP.mkv"
        );
        assert!(tracked.status_messages[0]
            .messages
            .iter()
            .any(|m| m.contains("Sample")));

        match rx.try_recv().unwrap() {
            DomainEvent::ManualInteractionRequired(event) => {
                assert_eq!(event.release_title, "Movie.Title.2020.1080p.WEB-DL-GRP");
                assert_eq!(event.media_ids, vec![f.media.id]);
            }
            other => panic!("unexpected event {}", other.name()),
        }

        assert!(f.service.retry_import("job"));
        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::ImportPending);
        assert!(tracked.status_messages.is_empty());
        assert!(!f.service.retry_import("job"));
    }

    #[tokio::test]
    async fn test_missing_output_folder_fails_import() {
        let f = fixture();
        grab(&f);
        let folder = f.dir.path().join("downloads/gone");
        track(&f, &folder.to_string_lossy(), true);

        f.service.check("job").unwrap();
        f.service.import("job").await.unwrap();

        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::ImportFailed);
        assert_eq!(tracked.status_messages[0].messages, vec!["Path does not exist"]);
    }

    #[test]
    fn test_expected_imports() {
        let mut media = Media::new(1, "Show", std::path::PathBuf::from("/library/Show"));
        media.monitored_unit_count = 0;
        let mut tracked = TrackedDownload::new(
            "c",
            DownloadProtocol::Usenet,
            DownloadClientItem::new("job", "Show", DownloadItemStatus::Completed),
        );
        tracked.remote_media = vec![media.clone()];
        assert_eq!(CompletedDownloadService::expected_imports(&tracked), 1);

        media.monitored_unit_count = 3;
        let mut other = media.clone();
        other.id = 2;
        other.monitored_unit_count = 2;
        tracked.remote_media = vec![media, other];
        assert_eq!(CompletedDownloadService::expected_imports(&tracked), 5);
    }
}
