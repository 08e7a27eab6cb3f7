use async_trait::async_trait;
use std::sync::Arc;

use super::{DirectBackend, ProtocolClient};
use crate::download::error::ReleaseDownloadError;
use crate::download::models::{DownloadProtocol, ReleaseInfo};

/// Direct-connect releases need no fetch: the release URL names the job.
pub struct DirectProtocolClient {
    backend: Arc<dyn DirectBackend>,
}

impl DirectProtocolClient {
    pub fn new(backend: Arc<dyn DirectBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ProtocolClient for DirectProtocolClient {
    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::DirectConnect
    }

    async fn download(&self, release: &ReleaseInfo) -> Result<String, ReleaseDownloadError> {
        let link = release
            .download_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ReleaseDownloadError::ReleaseUnavailable(format!(
                    "Release '{}' has no link",
                    release.title
                ))
            })?;

        self.backend.add_from_link(release, link).await?;
        Ok(link.to_string())
    }
}
