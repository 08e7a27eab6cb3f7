use async_trait::async_trait;
use std::sync::Arc;

use super::{ProtocolClient, UsenetBackend};
use crate::download::error::ReleaseDownloadError;
use crate::download::http::{fetch_release_file, FetchedRelease, HttpFetch};
use crate::download::models::{DownloadProtocol, ReleaseInfo};
use crate::parser::safe_file_name;

pub struct UsenetProtocolClient {
    backend: Arc<dyn UsenetBackend>,
    fetcher: Arc<dyn HttpFetch>,
}

impl UsenetProtocolClient {
    pub fn new(backend: Arc<dyn UsenetBackend>, fetcher: Arc<dyn HttpFetch>) -> Self {
        Self { backend, fetcher }
    }
}

#[async_trait]
impl ProtocolClient for UsenetProtocolClient {
    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    async fn download(&self, release: &ReleaseInfo) -> Result<String, ReleaseDownloadError> {
        let url = release
            .download_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ReleaseDownloadError::ReleaseUnavailable(format!(
                    "Release '{}' has no NZB URL",
                    release.title
                ))
            })?;

        let contents = match fetch_release_file(self.fetcher.as_ref(), url).await? {
            FetchedRelease::File(contents) => contents,
            FetchedRelease::Magnet(_) => {
                return Err(ReleaseDownloadError::fetch(
                    url,
                    "NZB URL redirected to a magnet link",
                ))
            }
        };
        let filename = format!("{}.nzb", safe_file_name(&release.title));

        self.backend
            .add_from_nzb_file(release, &filename, &contents)
            .await
    }
}
