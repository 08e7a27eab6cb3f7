//! Mirrors domain events into the history log.

use std::sync::Arc;

use tracing::{error, warn};

use super::models::{data_keys, HistoryEvent, HistoryEventType};
use super::store::HistoryStore;
use crate::events::{
    DomainEvent, DownloadFailedEvent, EventHandler, GrabbedEvent, MediaImportedEvent,
};

pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    fn append(&self, event: HistoryEvent) {
        if let Err(e) = self.store.append(&event) {
            error!(
                "Failed to record {:?} history for media {}: {}",
                event.event_type, event.media_id, e
            );
        }
    }

    fn on_grabbed(&self, grabbed: &GrabbedEvent) {
        let release = &grabbed.remote.release;
        for media in &grabbed.remote.media {
            let mut event = HistoryEvent::new(HistoryEventType::Grabbed, media.id, &release.title)
                .with_download_id(grabbed.download_id.clone())
                .with_quality(grabbed.remote.quality)
                .with_data(data_keys::INDEXER, &release.indexer)
                .with_data(data_keys::SIZE, release.size)
                .with_data(data_keys::INDEXER_FLAGS, release.indexer_flags)
                .with_data(data_keys::RELEASE_SOURCE, release.release_source.as_str())
                .with_data(data_keys::DOWNLOAD_CLIENT, &grabbed.download_client)
                .with_data(data_keys::DOWNLOAD_CLIENT_NAME, &grabbed.download_client_name)
                .with_data(data_keys::PUBLISHED_DATE, release.publish_date.to_rfc3339())
                .with_data(data_keys::GUID, &release.guid)
                .with_data(data_keys::PROTOCOL, release.protocol.as_str())
                .with_data(
                    data_keys::CUSTOM_FORMAT_SCORE,
                    grabbed.remote.custom_format_score,
                );
            if let Some(hash) = &release.info_hash {
                event = event.with_data(data_keys::TORRENT_INFO_HASH, hash);
            }
            self.append(event);
        }
    }

    fn on_failed(&self, failed: &DownloadFailedEvent) {
        if failed.media_ids.is_empty() {
            warn!(
                "Download failed event for '{}' has no media, not recording history",
                failed.source_title
            );
        }
        for media_id in &failed.media_ids {
            let mut event = HistoryEvent::new(
                HistoryEventType::DownloadFailed,
                *media_id,
                &failed.source_title,
            )
            .with_download_id(failed.download_id.clone())
            .with_quality(failed.quality);
            event.data = failed.data.clone();
            event = event.with_data(data_keys::MESSAGE, &failed.message);
            if let Some(client) = &failed.download_client {
                event = event.with_data(data_keys::DOWNLOAD_CLIENT, client);
            }
            self.append(event);
        }
    }

    fn on_imported(&self, imported: &MediaImportedEvent) {
        let file = &imported.media_file;
        let source_title = file
            .scene_name
            .clone()
            .unwrap_or_else(|| file.relative_path.clone());

        let mut event = HistoryEvent::new(
            HistoryEventType::DownloadFolderImported,
            imported.media_id,
            &source_title,
        )
        .with_download_id(imported.download_id.clone())
        .with_quality(file.quality)
        .with_data(
            data_keys::DROPPED_PATH,
            imported.source_path.to_string_lossy(),
        )
        .with_data(
            data_keys::IMPORTED_PATH,
            imported.imported_path.to_string_lossy(),
        )
        .with_data(data_keys::SIZE, file.size);
        if let Some(client) = &imported.download_client {
            event = event.with_data(data_keys::DOWNLOAD_CLIENT, client);
        }
        self.append(event);
    }
}

impl EventHandler for HistoryRecorder {
    fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::Grabbed(grabbed) => self.on_grabbed(grabbed),
            DomainEvent::DownloadFailed(failed) => self.on_failed(failed),
            DomainEvent::MediaImported(imported) => self.on_imported(imported),
            _ => {}
        }
    }
}
