//! Protocol-specific handoff of a release to a download client backend.
//!
//! A [`ProtocolClient`] knows how to turn a [`ReleaseInfo`] into whatever
//! its backend accepts (magnet link, torrent bytes, NZB bytes, plain link)
//! and returns the backend's job id.

mod direct;
mod torrent;
pub mod torrent_info;
mod usenet;

use async_trait::async_trait;

pub use direct::DirectProtocolClient;
pub use torrent::TorrentProtocolClient;
pub use usenet::UsenetProtocolClient;

use super::error::ReleaseDownloadError;
use super::models::{DownloadProtocol, ReleaseInfo};

#[async_trait]
pub trait ProtocolClient: Send + Sync {
    fn protocol(&self) -> DownloadProtocol;

    /// Hands the release to the backend, returning its job id.
    async fn download(&self, release: &ReleaseInfo) -> Result<String, ReleaseDownloadError>;
}

/// Torrent client backend.
///
/// Either add method may return [`ReleaseDownloadError::NotSupported`] when
/// the backend can't take that form of release.
#[async_trait]
pub trait TorrentBackend: Send + Sync {
    async fn add_from_magnet_link(
        &self,
        release: &ReleaseInfo,
        hash: &str,
        magnet_link: &str,
    ) -> Result<String, ReleaseDownloadError>;

    async fn add_from_torrent_file(
        &self,
        release: &ReleaseInfo,
        hash: &str,
        filename: &str,
        contents: &[u8],
    ) -> Result<String, ReleaseDownloadError>;
}

#[async_trait]
pub trait UsenetBackend: Send + Sync {
    async fn add_from_nzb_file(
        &self,
        release: &ReleaseInfo,
        filename: &str,
        contents: &[u8],
    ) -> Result<String, ReleaseDownloadError>;
}

#[async_trait]
pub trait DirectBackend: Send + Sync {
    async fn add_from_link(
        &self,
        release: &ReleaseInfo,
        link: &str,
    ) -> Result<String, ReleaseDownloadError>;
}
