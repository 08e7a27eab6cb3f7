//! Watch-folder ("blackhole") download clients.
//!
//! Releases are dropped as files into a watch folder for an external
//! downloader to pick up. Finished jobs appear as files or folders in the
//! completed folder, named after the dropped release.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::client::{DownloadClient, DownloadClientItem, DownloadItemStatus};
use super::error::ReleaseDownloadError;
use super::http::HttpFetch;
use super::models::{DownloadProtocol, ReleaseInfo, RemoteMedia};
use super::protocol::{
    DirectBackend, DirectProtocolClient, ProtocolClient, TorrentBackend, TorrentProtocolClient,
    UsenetBackend, UsenetProtocolClient,
};
use crate::config::WatchFolderClientSettings;
use crate::parser::{safe_file_name, strip_trailing_extensions};

/// Job id shared by the dropped file and the completed entry it turns into.
fn job_id(client_name: &str, title: &str) -> String {
    let digest = Sha256::digest(format!("{}_{}", client_name, title).as_bytes());
    hex::encode(&digest[..16])
}

/// Writes release files into the watch folder. Returns the dropped file name.
struct WatchFolderWriter {
    watch_folder: PathBuf,
}

impl WatchFolderWriter {
    async fn write(&self, filename: &str, contents: &[u8]) -> Result<String, ReleaseDownloadError> {
        let watch_folder = self.watch_folder.clone();
        let target_name = filename.to_string();
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || {
            Self::write_blocking(&watch_folder, &target_name, &contents)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!("Dropped {} into {:?}", filename, self.watch_folder);
        Ok(filename.to_string())
    }

    fn write_blocking(
        watch_folder: &Path,
        filename: &str,
        contents: &[u8],
    ) -> Result<(), ReleaseDownloadError> {
        std::fs::create_dir_all(watch_folder)?;

        // Written next to the target and renamed, so the downloader never
        // sees a partial file.
        let mut tmp = NamedTempFile::new_in(watch_folder)?;
        tmp.write_all(contents)?;
        tmp.persist(watch_folder.join(filename)).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl TorrentBackend for WatchFolderWriter {
    async fn add_from_magnet_link(
        &self,
        release: &ReleaseInfo,
        _hash: &str,
        magnet_link: &str,
    ) -> Result<String, ReleaseDownloadError> {
        let filename = format!("{}.magnet", safe_file_name(&release.title));
        self.write(&filename, magnet_link.as_bytes()).await
    }

    async fn add_from_torrent_file(
        &self,
        _release: &ReleaseInfo,
        _hash: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<String, ReleaseDownloadError> {
        self.write(filename, contents).await
    }
}

#[async_trait]
impl UsenetBackend for WatchFolderWriter {
    async fn add_from_nzb_file(
        &self,
        _release: &ReleaseInfo,
        filename: &str,
        contents: &[u8],
    ) -> Result<String, ReleaseDownloadError> {
        self.write(filename, contents).await
    }
}

#[async_trait]
impl DirectBackend for WatchFolderWriter {
    async fn add_from_link(
        &self,
        release: &ReleaseInfo,
        link: &str,
    ) -> Result<String, ReleaseDownloadError> {
        let filename = format!("{}.url", safe_file_name(&release.title));
        self.write(&filename, link.as_bytes()).await
    }
}

/// The completed side of a watch-folder client. Scanning walks the whole
/// folder tree, so it runs on the blocking pool.
#[derive(Debug, Clone)]
struct CompletedFolder {
    client_name: String,
    path: PathBuf,
    category: Option<String>,
    settle_time: Duration,
}

impl CompletedFolder {
    fn scan(&self) -> Result<Vec<DownloadClientItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let now = SystemTime::now();
        let mut items = Vec::new();
        let entries = std::fs::read_dir(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') {
                continue;
            }
            let title = strip_trailing_extensions(&file_name).to_string();

            let (total_size, last_write) = Self::size_and_last_write(&path);
            let still_writing = match last_write {
                Some(t) => match now.duration_since(t) {
                    Ok(age) => age < self.settle_time,
                    // modified "in the future": clock skew on a fresh write
                    Err(_) => !self.settle_time.is_zero(),
                },
                None => false,
            };

            let status = if still_writing {
                DownloadItemStatus::Downloading
            } else {
                DownloadItemStatus::Completed
            };
            let mut item =
                DownloadClientItem::new(&job_id(&self.client_name, &title), &title, status);
            item.category = self.category.clone();
            item.output_path = path.to_string_lossy().to_string();
            item.total_size = total_size;
            items.push(item);
        }

        Ok(items)
    }

    fn size_and_last_write(path: &Path) -> (u64, Option<SystemTime>) {
        let mut size = 0;
        let mut last_write: Option<SystemTime> = None;
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_file() {
                size += metadata.len();
            }
            if let Ok(modified) = metadata.modified() {
                last_write = Some(last_write.map_or(modified, |t| t.max(modified)));
            }
        }
        (size, last_write)
    }

    fn remove(path: &Path) -> Result<()> {
        if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
        .with_context(|| format!("Failed to remove {:?}", path))
    }
}

pub struct WatchFolderClient {
    name: String,
    protocol: DownloadProtocol,
    completed: CompletedFolder,
    protocol_client: Arc<dyn ProtocolClient>,
}

impl WatchFolderClient {
    pub fn new(
        settings: &WatchFolderClientSettings,
        fetcher: Arc<dyn HttpFetch>,
        prefer_torrent_file: bool,
    ) -> Self {
        let writer = Arc::new(WatchFolderWriter {
            watch_folder: settings.watch_folder.clone(),
        });
        let protocol_client: Arc<dyn ProtocolClient> = match settings.protocol {
            DownloadProtocol::Torrent => Arc::new(
                TorrentProtocolClient::new(writer, fetcher)
                    .with_prefer_torrent_file(prefer_torrent_file),
            ),
            DownloadProtocol::Usenet => Arc::new(UsenetProtocolClient::new(writer, fetcher)),
            DownloadProtocol::DirectConnect => Arc::new(DirectProtocolClient::new(writer)),
        };

        Self {
            name: settings.name.clone(),
            protocol: settings.protocol,
            completed: CompletedFolder {
                client_name: settings.name.clone(),
                path: settings.completed_folder.clone(),
                category: settings.category.clone(),
                settle_time: Duration::from_secs(settings.settle_secs),
            },
            protocol_client,
        }
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.completed.settle_time = settle_time;
        self
    }

    async fn scan(&self) -> Result<Vec<DownloadClientItem>> {
        let completed = self.completed.clone();
        tokio::task::spawn_blocking(move || completed.scan())
            .await
            .context("Completed folder scan panicked")?
    }
}

#[async_trait]
impl DownloadClient for WatchFolderClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocol(&self) -> DownloadProtocol {
        self.protocol
    }

    /// The job is identified by its title, which the downloader reuses for
    /// the completed entry, not by whatever the protocol client returned.
    async fn download(&self, remote: &RemoteMedia) -> Result<String, ReleaseDownloadError> {
        self.protocol_client.download(&remote.release).await?;
        Ok(job_id(&self.name, &safe_file_name(&remote.release.title)))
    }

    async fn get_items(&self) -> Result<Vec<DownloadClientItem>> {
        self.scan().await
    }

    async fn remove_item(&self, download_id: &str, delete_data: bool) -> Result<()> {
        if !delete_data {
            return Ok(());
        }
        let Some(item) = self
            .scan()
            .await?
            .into_iter()
            .find(|i| i.download_id == download_id)
        else {
            debug!("{}: item {} already gone", self.name, download_id);
            return Ok(());
        };

        let path = PathBuf::from(&item.output_path);
        tokio::task::spawn_blocking(move || CompletedFolder::remove(&path))
            .await
            .context("Removing completed download panicked")??;
        info!("{}: removed {}", self.name, item.title);
        Ok(())
    }
}
