use chrono::{DateTime, Utc};
use tracing::warn;

use crate::download::client::DownloadClientItem;
use crate::download::models::DownloadProtocol;
use crate::library::Media;
use crate::qualities::QualityModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedDownloadState {
    Downloading,
    ImportPending,
    Importing,
    Imported,
    ImportFailed,
    FailedPending,
    Failed,
}

impl TrackedDownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedDownloadState::Downloading => "Downloading",
            TrackedDownloadState::ImportPending => "ImportPending",
            TrackedDownloadState::Importing => "Importing",
            TrackedDownloadState::Imported => "Imported",
            TrackedDownloadState::ImportFailed => "ImportFailed",
            TrackedDownloadState::FailedPending => "FailedPending",
            TrackedDownloadState::Failed => "Failed",
        }
    }

    /// Imported and Failed are never left automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackedDownloadState::Imported | TrackedDownloadState::Failed
        )
    }
}

/// User-visible warning attached to a tracked download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub title: String,
    pub messages: Vec<String>,
}

impl StatusMessage {
    pub fn new(title: &str, messages: Vec<String>) -> Self {
        Self {
            title: title.to_string(),
            messages,
        }
    }
}

/// Live view of one external job correlated with a grab.
#[derive(Debug, Clone)]
pub struct TrackedDownload {
    pub download_id: String,
    pub client_name: String,
    pub protocol: DownloadProtocol,
    pub state: TrackedDownloadState,
    pub item: DownloadClientItem,
    pub remote_media: Vec<Media>,
    pub grabbed_quality: Option<QualityModel>,
    pub indexer: Option<String>,
    pub status_messages: Vec<StatusMessage>,
    /// False once the client stopped reporting the job.
    pub is_trackable: bool,
    pub added: DateTime<Utc>,
}

impl TrackedDownload {
    pub fn new(client_name: &str, protocol: DownloadProtocol, item: DownloadClientItem) -> Self {
        Self {
            download_id: item.download_id.clone(),
            client_name: client_name.to_string(),
            protocol,
            state: TrackedDownloadState::Downloading,
            item,
            remote_media: Vec::new(),
            grabbed_quality: None,
            indexer: None,
            status_messages: Vec::new(),
            is_trackable: true,
            added: Utc::now(),
        }
    }

    pub fn media_ids(&self) -> Vec<i64> {
        self.remote_media.iter().map(|m| m.id).collect()
    }

    /// Replaces the status messages with a single warning.
    pub fn warn(&mut self, message: &str) {
        warn!("{}: {}", self.item.title, message);
        self.status_messages = vec![StatusMessage::new(
            &self.item.title,
            vec![message.to_string()],
        )];
    }

    pub fn warn_many(&mut self, status_messages: Vec<StatusMessage>) {
        for status in &status_messages {
            for message in &status.messages {
                warn!("{} ({}): {}", self.item.title, status.title, message);
            }
        }
        self.status_messages = status_messages;
    }
}
