//! Sends one release to the download client for its protocol.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::DownloadClientProvider;
use super::error::{DownloadServiceError, ReleaseDownloadError};
use super::indexer_status::IndexerStatusService;
use super::models::RemoteMedia;
use super::rate_limit::HostRateLimiter;
use crate::events::{DomainEvent, EventBus, GrabbedEvent};

pub struct DownloadService {
    clients: DownloadClientProvider,
    indexer_status: Arc<IndexerStatusService>,
    rate_limiter: Arc<HostRateLimiter>,
    events: Arc<EventBus>,
    grab_spacing: Duration,
}

impl DownloadService {
    pub fn new(
        clients: DownloadClientProvider,
        indexer_status: Arc<IndexerStatusService>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            clients,
            indexer_status,
            rate_limiter: Arc::new(HostRateLimiter::new()),
            events,
            grab_spacing: Duration::from_secs(2),
        }
    }

    pub fn with_grab_spacing(mut self, spacing: Duration) -> Self {
        self.grab_spacing = spacing;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<HostRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Grabs the release, returning the client's job id.
    pub async fn download_report(
        &self,
        remote: &RemoteMedia,
    ) -> Result<String, DownloadServiceError> {
        let release = &remote.release;
        let client = self
            .clients
            .get_client(release.protocol)
            .ok_or(DownloadServiceError::ClientUnavailable(release.protocol))?;

        // Magnets never hit the indexer, so only file fetches are spaced.
        if let Some(url) = release
            .download_url
            .as_deref()
            .filter(|u| !u.starts_with("magnet:"))
        {
            if let Some(host) = HostRateLimiter::host_key(url) {
                self.rate_limiter
                    .wait_and_pulse(&host, self.grab_spacing)
                    .await;
            }
        }

        let download_id = match client.download(remote).await {
            Ok(id) => id,
            Err(e) => {
                self.record_failure(remote, &e);
                return Err(e.into());
            }
        };

        self.indexer_status.record_success(release.indexer_id);

        info!(
            "Report sent to {} from indexer {}. {}",
            client.name(),
            release.indexer,
            release.title
        );

        self.events.publish(DomainEvent::Grabbed(GrabbedEvent {
            remote: remote.clone(),
            download_client: client.name().to_string(),
            download_client_name: client.name().to_string(),
            download_id: Some(download_id.clone()).filter(|id| !id.is_empty()),
        }));

        Ok(download_id)
    }

    fn record_failure(&self, remote: &RemoteMedia, error: &ReleaseDownloadError) {
        let release = &remote.release;
        match error {
            ReleaseDownloadError::NotSupported(reason) => {
                warn!(
                    "Download client doesn't support '{}': {}",
                    release.title, reason
                );
            }
            ReleaseDownloadError::ReleaseUnavailable(_) => {
                debug!("Release '{}' is no longer available", release.title);
            }
            ReleaseDownloadError::TooManyRequests { retry_after, .. } => {
                self.indexer_status
                    .record_failure(release.indexer_id, *retry_after);
            }
            _ => {
                self.indexer_status.record_failure(release.indexer_id, None);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeDownloadClient;
    use super::*;
    use crate::download::client::DownloadClient;
    use crate::download::models::{DownloadProtocol, ReleaseInfo};
    use crate::qualities::{Quality, QualityModel};

    fn remote(protocol: DownloadProtocol) -> RemoteMedia {
        let mut release = ReleaseInfo::new("Movie.2020.1080p-GRP", protocol);
        release.indexer_id = 7;
        release.indexer = "indexer".to_string();
        release.download_url = Some("http://indexer.test/get/1".to_string());
        RemoteMedia {
            release,
            parsed_info: None,
            media: Vec::new(),
            quality: QualityModel::new(Quality::WebDl1080p),
            custom_format_score: 0,
        }
    }

    fn service(client: FakeDownloadClient) -> (DownloadService, Arc<IndexerStatusService>, Arc<EventBus>) {
        let status = Arc::new(IndexerStatusService::new());
        let events = Arc::new(EventBus::new());
        let clients: Vec<Arc<dyn DownloadClient>> = vec![Arc::new(client)];
        let service = DownloadService::new(
            DownloadClientProvider::new(clients),
            status.clone(),
            events.clone(),
        )
        .with_grab_spacing(Duration::ZERO);
        (service, status, events)
    }

    #[tokio::test]
    async fn test_successful_grab_publishes_event() {
        let (service, _, events) = service(FakeDownloadClient::new(DownloadProtocol::Usenet));
        let mut rx = events.subscribe();

        let id = service
            .download_report(&remote(DownloadProtocol::Usenet))
            .await
            .unwrap();
        assert_eq!(id, "job-Movie.2020.1080p-GRP");

        match rx.recv().await.unwrap() {
            DomainEvent::Grabbed(grabbed) => {
                assert_eq!(grabbed.download_id.as_deref(), Some(id.as_str()));
                assert_eq!(grabbed.download_client, "fake");
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_missing_client_for_protocol() {
        let (service, _, _) = service(FakeDownloadClient::new(DownloadProtocol::Usenet));

        let err = service
            .download_report(&remote(DownloadProtocol::Torrent))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadServiceError::ClientUnavailable(DownloadProtocol::Torrent)
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_grab_backs_off_indexer() {
        let client = FakeDownloadClient::new(DownloadProtocol::Usenet).failing(
            ReleaseDownloadError::TooManyRequests {
                url: "http://indexer.test/get/1".to_string(),
                retry_after: Some(Duration::from_secs(3600)),
            },
        );
        let (service, status, _) = service(client);

        assert!(service
            .download_report(&remote(DownloadProtocol::Usenet))
            .await
            .is_err());
        assert!(status.is_disabled(7));
    }

    #[tokio::test]
    async fn test_not_supported_leaves_indexer_alone() {
        let client = FakeDownloadClient::new(DownloadProtocol::Usenet)
            .failing(ReleaseDownloadError::NotSupported("nzb".to_string()));
        let (service, status, _) = service(client);

        assert!(service
            .download_report(&remote(DownloadProtocol::Usenet))
            .await
            .is_err());
        assert!(status.status(7).is_none());
    }

    #[tokio::test]
    async fn test_generic_failure_records_indexer_failure() {
        let client = FakeDownloadClient::new(DownloadProtocol::Usenet)
            .failing(ReleaseDownloadError::fetch("http://indexer.test/get/1", "boom"));
        let (service, status, _) = service(client);

        assert!(service
            .download_report(&remote(DownloadProtocol::Usenet))
            .await
            .is_err());
        assert_eq!(status.status(7).unwrap().escalation, 1);
    }
}
