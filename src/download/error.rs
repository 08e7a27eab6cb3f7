use std::time::Duration;
use thiserror::Error;

use super::models::DownloadProtocol;

/// Any failure turning a release into a download client job.
#[derive(Debug, Error)]
pub enum ReleaseDownloadError {
    #[error("Release no longer available: {0}")]
    ReleaseUnavailable(String),

    #[error("Too many requests to {url}")]
    TooManyRequests {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Not supported by download client: {0}")]
    NotSupported(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Invalid torrent: {0}")]
    InvalidTorrent(String),

    #[error("Download client rejected release: {0}")]
    ClientRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseDownloadError {
    pub fn fetch(url: &str, message: impl ToString) -> Self {
        ReleaseDownloadError::Fetch {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadServiceError {
    #[error("{0} download client isn't configured yet")]
    ClientUnavailable(DownloadProtocol),

    #[error(transparent)]
    Release(#[from] ReleaseDownloadError),
}
