//! The download-client surface the rest of the crate consumes.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::error::ReleaseDownloadError;
use super::models::{DownloadProtocol, RemoteMedia};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadItemStatus {
    Queued,
    Paused,
    Downloading,
    Completed,
    Failed,
    Warning,
}

impl DownloadItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadItemStatus::Queued => "queued",
            DownloadItemStatus::Paused => "paused",
            DownloadItemStatus::Downloading => "downloading",
            DownloadItemStatus::Completed => "completed",
            DownloadItemStatus::Failed => "failed",
            DownloadItemStatus::Warning => "warning",
        }
    }
}

/// One job as reported by a download client.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadClientItem {
    pub download_id: String,
    pub title: String,
    pub category: Option<String>,
    pub status: DownloadItemStatus,
    /// Where the finished job's files are. Empty until the client knows.
    pub output_path: String,
    pub is_encrypted: bool,
    pub message: Option<String>,
    pub can_be_removed: bool,
    /// False when the client still needs the files (seeding), so imports copy.
    pub can_move_files: bool,
    pub total_size: u64,
    pub remaining_size: u64,
}

impl DownloadClientItem {
    pub fn new(download_id: &str, title: &str, status: DownloadItemStatus) -> Self {
        Self {
            download_id: download_id.to_string(),
            title: title.to_string(),
            category: None,
            status,
            output_path: String::new(),
            is_encrypted: false,
            message: None,
            can_be_removed: true,
            can_move_files: true,
            total_size: 0,
            remaining_size: 0,
        }
    }
}

#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Configured instance name, recorded in history.
    fn name(&self) -> &str;

    fn protocol(&self) -> DownloadProtocol;

    /// Hands a release to the client, returning the job id.
    async fn download(&self, remote: &RemoteMedia) -> Result<String, ReleaseDownloadError>;

    async fn get_items(&self) -> Result<Vec<DownloadClientItem>>;

    async fn remove_item(&self, download_id: &str, delete_data: bool) -> Result<()>;
}

/// Lookup of configured download clients.
#[derive(Default, Clone)]
pub struct DownloadClientProvider {
    clients: Vec<Arc<dyn DownloadClient>>,
}

impl DownloadClientProvider {
    pub fn new(clients: Vec<Arc<dyn DownloadClient>>) -> Self {
        Self { clients }
    }

    /// First client configured for the protocol.
    pub fn get_client(&self, protocol: DownloadProtocol) -> Option<Arc<dyn DownloadClient>> {
        self.clients
            .iter()
            .find(|c| c.protocol() == protocol)
            .cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn DownloadClient>> {
        self.clients.iter().find(|c| c.name() == name).cloned()
    }

    pub fn all(&self) -> &[Arc<dyn DownloadClient>] {
        &self.clients
    }
}
