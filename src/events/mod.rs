//! In-process domain events.
//!
//! Handlers registered on the [`EventBus`] run synchronously, in registration
//! order, on the publishing task. Every event is then also sent on a
//! broadcast channel for observers that only want to watch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::download::RemoteMedia;
use crate::library::MediaFile;
use crate::qualities::QualityModel;

#[derive(Debug, Clone)]
pub struct GrabbedEvent {
    pub remote: RemoteMedia,
    pub download_client: String,
    pub download_client_name: String,
    pub download_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DownloadFailedEvent {
    pub media_ids: Vec<i64>,
    pub quality: QualityModel,
    pub source_title: String,
    pub download_client: Option<String>,
    pub download_id: Option<String>,
    pub message: String,
    pub data: HashMap<String, String>,
    pub skip_redownload: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadCompletedEvent {
    pub download_id: String,
    pub title: String,
    pub media_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ManualInteractionRequiredEvent {
    pub download_id: String,
    /// Title of the release as reported by the download client.
    pub release_title: String,
    pub media_ids: Vec<i64>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MediaImportedEvent {
    pub media_id: i64,
    pub media_file: MediaFile,
    pub replaced_files: Vec<MediaFile>,
    pub source_path: PathBuf,
    pub imported_path: PathBuf,
    pub download_client: Option<String>,
    pub download_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    Grabbed(GrabbedEvent),
    DownloadFailed(DownloadFailedEvent),
    DownloadCompleted(DownloadCompletedEvent),
    ManualInteractionRequired(ManualInteractionRequiredEvent),
    MediaImported(MediaImportedEvent),
    /// One monitoring pass finished.
    DownloadsProcessed,
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Grabbed(_) => "Grabbed",
            DomainEvent::DownloadFailed(_) => "DownloadFailed",
            DomainEvent::DownloadCompleted(_) => "DownloadCompleted",
            DomainEvent::ManualInteractionRequired(_) => "ManualInteractionRequired",
            DomainEvent::MediaImported(_) => "MediaImported",
            DomainEvent::DownloadsProcessed => "DownloadsProcessed",
        }
    }
}

/// Synchronous event consumer.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &DomainEvent);
}

pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            handlers: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        match self.handlers.write() {
            Ok(mut handlers) => handlers.push(handler),
            Err(_) => warn!("Event handler list poisoned, handler not registered"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        debug!("Publishing {} event", event.name());

        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(_) => {
                warn!("Event handler list poisoned, skipping handlers");
                Vec::new()
            }
        };
        for handler in handlers {
            handler.handle(&event);
        }

        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingHandler {
        seen: Mutex<Vec<&'static str>>,
    }

    impl EventHandler for RecordingHandler {
        fn handle(&self, event: &DomainEvent) {
            self.seen.lock().unwrap().push(event.name());
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_handlers_and_subscribers() {
        let bus = EventBus::new();
        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        bus.register(handler.clone());
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::DownloadsProcessed);

        assert_eq!(*handler.seen.lock().unwrap(), vec!["DownloadsProcessed"]);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "DownloadsProcessed");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(DomainEvent::DownloadsProcessed);
    }
}
