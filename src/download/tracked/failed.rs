//! Failed-download handling: `Downloading -> FailedPending -> Failed`.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::TrackedDownloadState;
use super::store::TrackedDownloadStore;
use crate::download::client::DownloadItemStatus;
use crate::events::{DomainEvent, DownloadFailedEvent, EventBus};
use crate::history::{HistoryEvent, HistoryEventType, HistoryStore};

pub struct FailedDownloadService {
    store: Arc<TrackedDownloadStore>,
    history: Arc<dyn HistoryStore>,
    events: Arc<EventBus>,
}

impl FailedDownloadService {
    pub fn new(
        store: Arc<TrackedDownloadStore>,
        history: Arc<dyn HistoryStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            history,
            events,
        }
    }

    fn grabs(&self, download_id: &str) -> Result<Vec<HistoryEvent>> {
        self.history
            .find_by_download_id_and_type(download_id, HistoryEventType::Grabbed)
    }

    /// Moves a failed or encrypted job to FailedPending. No-op unless the job
    /// is Downloading.
    pub fn check(&self, download_id: &str) -> Result<()> {
        let Some(tracked) = self.store.get(download_id) else {
            return Ok(());
        };
        if tracked.state != TrackedDownloadState::Downloading {
            return Ok(());
        }
        let item = &tracked.item;
        if !item.is_encrypted && item.status != DownloadItemStatus::Failed {
            return Ok(());
        }

        if self.grabs(download_id)?.is_empty() {
            self.store.update(download_id, |t| {
                t.warn("Download wasn't grabbed by us, skipping")
            });
            return Ok(());
        }

        self.store.transition(
            download_id,
            TrackedDownloadState::Downloading,
            TrackedDownloadState::FailedPending,
        );
        Ok(())
    }

    /// Marks a FailedPending job Failed and publishes the failure.
    pub fn process_failed(&self, download_id: &str) -> Result<()> {
        let Some(tracked) = self.store.get(download_id) else {
            return Ok(());
        };
        if tracked.state != TrackedDownloadState::FailedPending {
            return Ok(());
        }

        let grabs = self.grabs(download_id)?;
        if grabs.is_empty() {
            return Ok(());
        }

        let reason = if tracked.item.is_encrypted {
            "Encrypted download detected".to_string()
        } else if let Some(message) = tracked.item.message.as_ref().filter(|m| !m.is_empty()) {
            message.clone()
        } else {
            "Failed download detected".to_string()
        };

        if !self.store.transition(
            download_id,
            TrackedDownloadState::FailedPending,
            TrackedDownloadState::Failed,
        ) {
            return Ok(());
        }
        self.store.update(download_id, |t| t.warn(&reason));

        self.publish_failed(&grabs, Some(tracked.client_name.clone()), &reason, false);
        Ok(())
    }

    /// Fails a download by hand, from any state.
    pub fn mark_as_failed(&self, download_id: &str, skip_redownload: bool) -> Result<()> {
        let grabs = self.grabs(download_id)?;
        if grabs.is_empty() {
            bail!("No grab history for download {}", download_id);
        }

        let client = self.store.update(download_id, |t| {
            t.state = TrackedDownloadState::Failed;
            t.client_name.clone()
        });
        self.publish_failed(&grabs, client, "Manually marked as failed", skip_redownload);
        Ok(())
    }

    /// Fails the download a grab history entry belongs to.
    pub fn mark_history_as_failed(&self, history_id: i64, skip_redownload: bool) -> Result<()> {
        let event = self
            .history
            .get(history_id)?
            .with_context(|| format!("History item {} not found", history_id))?;
        if event.event_type != HistoryEventType::Grabbed {
            bail!("History item {} is not a grab", history_id);
        }

        match &event.download_id {
            Some(download_id) => self.mark_as_failed(download_id, skip_redownload),
            None => {
                self.publish_failed(&[event], None, "Manually marked as failed", skip_redownload);
                Ok(())
            }
        }
    }

    fn publish_failed(
        &self,
        grabs: &[HistoryEvent],
        client_name: Option<String>,
        message: &str,
        skip_redownload: bool,
    ) {
        let Some(latest) = grabs.first() else {
            return;
        };
        let media_ids: Vec<i64> = grabs
            .iter()
            .map(|e| e.media_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        warn!("{}: {}", latest.source_title, message);
        info!(
            "Download '{}' failed, {} media affected",
            latest.source_title,
            media_ids.len()
        );

        self.events
            .publish(DomainEvent::DownloadFailed(DownloadFailedEvent {
                media_ids,
                quality: latest.quality,
                source_title: latest.source_title.clone(),
                download_client: client_name.or_else(|| {
                    latest
                        .data_value(crate::history::data_keys::DOWNLOAD_CLIENT)
                        .map(str::to_string)
                }),
                download_id: latest.download_id.clone(),
                message: message.to_string(),
                data: latest.data.clone(),
                skip_redownload,
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::client::DownloadClientItem;
    use crate::download::models::DownloadProtocol;
    use crate::download::tracked::models::TrackedDownload;
    use crate::history::SqliteHistoryStore;
    use crate::qualities::{Quality, QualityModel};
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        service: FailedDownloadService,
        store: Arc<TrackedDownloadStore>,
        history: Arc<SqliteHistoryStore>,
        events: Arc<EventBus>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(TrackedDownloadStore::new());
        let history = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        Fixture {
            service: FailedDownloadService::new(store.clone(), history.clone(), events.clone()),
            store,
            history,
            events,
        }
    }

    fn grab(f: &Fixture, media_id: i64) -> i64 {
        f.history
            .append(
                &HistoryEvent::new(HistoryEventType::Grabbed, media_id, "Movie.2020.1080p-GRP")
                    .with_download_id(Some("job".to_string()))
                    .with_quality(QualityModel::new(Quality::WebDl1080p)),
            )
            .unwrap()
    }

    fn track(f: &Fixture, status: DownloadItemStatus, encrypted: bool, message: Option<&str>) {
        let mut item = DownloadClientItem::new("job", "Movie.2020.1080p-GRP", status);
        item.is_encrypted = encrypted;
        item.message = message.map(str::to_string);
        f.store
            .upsert(TrackedDownload::new("client", DownloadProtocol::Usenet, item));
    }

    #[test]
    fn test_failed_job_without_grab_is_skipped() {
        let f = fixture();
        track(&f, DownloadItemStatus::Failed, false, None);

        f.service.check("job").unwrap();
        let tracked = f.store.get("job").unwrap();
        assert_eq!(tracked.state, TrackedDownloadState::Downloading);
        assert_eq!(
            tracked.status_messages[0].messages[0],
            "Download wasn't grabbed by us, skipping"
        );
    }

    #[test]
    fn test_failed_flow_publishes_once() {
        let f = fixture();
        grab(&f, 1);
        grab(&f, 2);
        track(&f, DownloadItemStatus::Failed, false, Some("Unpacking failed"));
        let mut rx = f.events.subscribe();

        f.service.check("job").unwrap();
        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::FailedPending);

        f.service.process_failed("job").unwrap();
        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::Failed);

        match rx.try_recv().unwrap() {
            DomainEvent::DownloadFailed(failed) => {
                assert_eq!(failed.message, "Unpacking failed");
                assert_eq!(failed.media_ids, vec![1, 2]);
                assert_eq!(failed.download_client.as_deref(), Some("client"));
                assert!(!failed.skip_redownload);
            }
            other => panic!("unexpected event {}", other.name()),
        }

        // Repeating either step changes nothing and publishes nothing.
        f.service.check("job").unwrap();
        f.service.process_failed("job").unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_encrypted_reason() {
        let f = fixture();
        grab(&f, 1);
        track(&f, DownloadItemStatus::Downloading, true, Some("ignored"));
        let mut rx = f.events.subscribe();

        f.service.check("job").unwrap();
        f.service.process_failed("job").unwrap();

        match rx.try_recv().unwrap() {
            DomainEvent::DownloadFailed(failed) => {
                assert_eq!(failed.message, "Encrypted download detected")
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[test]
    fn test_healthy_job_is_untouched() {
        let f = fixture();
        grab(&f, 1);
        track(&f, DownloadItemStatus::Downloading, false, None);

        f.service.check("job").unwrap();
        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::Downloading);
    }

    #[test]
    fn test_mark_history_as_failed() {
        let f = fixture();
        let history_id = grab(&f, 1);
        track(&f, DownloadItemStatus::Completed, false, None);
        let mut rx = f.events.subscribe();

        f.service.mark_history_as_failed(history_id, true).unwrap();

        assert_eq!(f.store.get("job").unwrap().state, TrackedDownloadState::Failed);
        match rx.try_recv().unwrap() {
            DomainEvent::DownloadFailed(failed) => {
                assert_eq!(failed.message, "Manually marked as failed");
                assert!(failed.skip_redownload);
            }
            other => panic!("unexpected event {}", other.name()),
        }
        assert!(f.service.mark_as_failed("unknown", false).is_err());
    }
}
