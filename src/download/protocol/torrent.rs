use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::torrent_info::{info_hash_from_magnet, info_hash_from_torrent};
use super::{ProtocolClient, TorrentBackend};
use crate::download::error::ReleaseDownloadError;
use crate::download::http::{fetch_release_file, FetchedRelease, HttpFetch};
use crate::download::models::{DownloadProtocol, ReleaseInfo};
use crate::parser::safe_file_name;

pub struct TorrentProtocolClient {
    backend: Arc<dyn TorrentBackend>,
    fetcher: Arc<dyn HttpFetch>,
    prefer_torrent_file: bool,
}

impl TorrentProtocolClient {
    pub fn new(backend: Arc<dyn TorrentBackend>, fetcher: Arc<dyn HttpFetch>) -> Self {
        Self {
            backend,
            fetcher,
            prefer_torrent_file: false,
        }
    }

    pub fn with_prefer_torrent_file(mut self, prefer: bool) -> Self {
        self.prefer_torrent_file = prefer;
        self
    }

    /// Magnet and torrent-file URLs of a release. A download URL that is
    /// itself a magnet counts as the magnet.
    fn urls(release: &ReleaseInfo) -> (Option<String>, Option<String>) {
        let mut magnet = release.magnet_url.clone().filter(|u| !u.is_empty());
        let mut file = None;
        if let Some(url) = release.download_url.as_ref().filter(|u| !u.is_empty()) {
            if url.starts_with("magnet:") {
                magnet.get_or_insert_with(|| url.clone());
            } else {
                file = Some(url.clone());
            }
        }
        (magnet, file)
    }

    async fn download_from_magnet(
        &self,
        release: &ReleaseInfo,
        magnet: &str,
    ) -> Result<String, ReleaseDownloadError> {
        let hash = info_hash_from_magnet(magnet).ok_or_else(|| {
            ReleaseDownloadError::InvalidTorrent(format!(
                "Failed to parse magnet link for release '{}'",
                release.title
            ))
        })?;

        let id = self
            .backend
            .add_from_magnet_link(release, &hash, magnet)
            .await?;
        Self::check_hash(release, &hash, &id);
        Ok(id)
    }

    async fn download_from_web_url(
        &self,
        release: &ReleaseInfo,
        url: &str,
    ) -> Result<String, ReleaseDownloadError> {
        let contents = match fetch_release_file(self.fetcher.as_ref(), url).await? {
            FetchedRelease::Magnet(magnet) => {
                debug!("Torrent download URL for '{}' redirected to magnet", release.title);
                return self.download_from_magnet(release, &magnet).await;
            }
            FetchedRelease::File(contents) => contents,
        };

        let hash = info_hash_from_torrent(&contents).map_err(|e| {
            warn!("Invalid torrent file for release '{}': {}", release.title, e);
            e
        })?;
        let filename = format!("{}.torrent", safe_file_name(&release.title));

        let id = self
            .backend
            .add_from_torrent_file(release, &hash, &filename, &contents)
            .await?;
        Self::check_hash(release, &hash, &id);
        Ok(id)
    }

    fn check_hash(release: &ReleaseInfo, expected: &str, actual: &str) {
        if !actual.eq_ignore_ascii_case(expected) {
            debug!(
                "Torrent client returned id {} for '{}', expected info-hash {}",
                actual, release.title, expected
            );
        }
    }
}

#[async_trait]
impl ProtocolClient for TorrentProtocolClient {
    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Torrent
    }

    async fn download(&self, release: &ReleaseInfo) -> Result<String, ReleaseDownloadError> {
        let (magnet, file) = Self::urls(release);

        match (magnet, file) {
            (None, None) => Err(ReleaseDownloadError::ReleaseUnavailable(format!(
                "Release '{}' has no download URL",
                release.title
            ))),
            (Some(magnet), None) => self.download_from_magnet(release, &magnet).await,
            (None, Some(file)) => self.download_from_web_url(release, &file).await,
            (Some(magnet), Some(file)) if self.prefer_torrent_file => {
                match self.download_from_web_url(release, &file).await {
                    Ok(id) => Ok(id),
                    Err(e) => {
                        debug!(
                            "Torrent file download failed for '{}' ({}), trying magnet",
                            release.title, e
                        );
                        self.download_from_magnet(release, &magnet).await
                    }
                }
            }
            (Some(magnet), Some(file)) => {
                match self.download_from_magnet(release, &magnet).await {
                    Err(ReleaseDownloadError::NotSupported(reason)) => {
                        debug!(
                            "Magnet not supported for '{}' ({}), falling back to torrent file",
                            release.title, reason
                        );
                        self.download_from_web_url(release, &file).await
                    }
                    other => other,
                }
            }
        }
    }
}
