//! Background driver for tracked downloads.
//!
//! Every tick refreshes the jobs reported by each download client, then
//! processes the tracked downloads that are waiting on us.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::completed::CompletedDownloadService;
use super::failed::FailedDownloadService;
use super::models::{TrackedDownload, TrackedDownloadState};
use super::service::TrackedDownloadService;
use crate::config::ImportSettings;
use crate::download::client::{DownloadClient, DownloadClientItem, DownloadClientProvider};
use crate::events::{DomainEvent, EventBus};

pub struct DownloadMonitor {
    clients: DownloadClientProvider,
    tracked: Arc<TrackedDownloadService>,
    failed: Arc<FailedDownloadService>,
    completed: Arc<CompletedDownloadService>,
    events: Arc<EventBus>,
    settings: ImportSettings,
    tick_interval: Duration,
}

impl DownloadMonitor {
    pub fn new(
        clients: DownloadClientProvider,
        tracked: Arc<TrackedDownloadService>,
        failed: Arc<FailedDownloadService>,
        completed: Arc<CompletedDownloadService>,
        events: Arc<EventBus>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            clients,
            tracked,
            failed,
            completed,
            events,
            settings,
            tick_interval: Duration::from_secs(60),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Ticks until `shutdown` fires. A tick in progress is finished first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Download monitor starting (tick_interval={}s)",
            self.tick_interval.as_secs()
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Download monitor shutting down");
                    break;
                }
            }
        }

        info!("Download monitor stopped");
    }

    /// One refresh-then-process pass. Clients are polled concurrently.
    pub async fn tick(&self) {
        let polled = join_all(
            self.clients
                .all()
                .iter()
                .map(|client| async move { (client, client.get_items().await) }),
        )
        .await;
        for (client, items) in polled {
            self.refresh_client(client.as_ref(), items);
        }
        self.process().await;
    }

    fn refresh_client(&self, client: &dyn DownloadClient, items: Result<Vec<DownloadClientItem>>) {
        let items = match items {
            Ok(items) => items,
            Err(e) => {
                warn!("Couldn't get items from download client {}: {:#}", client.name(), e);
                return;
            }
        };

        let mut seen = BTreeSet::new();
        for item in items {
            let download_id = item.download_id.clone();
            seen.insert(download_id.clone());

            let tracked = match self
                .tracked
                .track_download(client.name(), client.protocol(), item)
            {
                Ok(Some(tracked)) => tracked,
                Ok(None) => continue,
                Err(e) => {
                    error!("Couldn't track download {}: {:#}", download_id, e);
                    continue;
                }
            };

            if tracked.state == TrackedDownloadState::Downloading {
                if let Err(e) = self.failed.check(&download_id) {
                    error!("Failed-download check for '{}' errored: {:#}", tracked.item.title, e);
                }
                if let Err(e) = self.completed.check(&download_id) {
                    error!(
                        "Completed-download check for '{}' errored: {:#}",
                        tracked.item.title, e
                    );
                }
            }
        }

        self.tracked.update_trackable(client.name(), &seen);
    }

    async fn process(&self) {
        let store = self.tracked.store();

        for tracked in store.all().into_iter().filter(|t| t.is_trackable) {
            let result = match tracked.state {
                TrackedDownloadState::FailedPending => {
                    self.failed.process_failed(&tracked.download_id)
                }
                TrackedDownloadState::ImportPending
                    if self.settings.enable_completed_download_handling =>
                {
                    self.completed.import(&tracked.download_id).await
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                error!("Couldn't process '{}': {:#}", tracked.item.title, e);
            }
        }

        if self.settings.remove_completed_downloads {
            for tracked in store.in_state(TrackedDownloadState::Imported) {
                if tracked.is_trackable && tracked.item.can_be_removed {
                    self.remove_from_client(&tracked).await;
                }
            }
        }

        self.events.publish(DomainEvent::DownloadsProcessed);
    }

    async fn remove_from_client(&self, tracked: &TrackedDownload) {
        let Some(client) = self.clients.get_by_name(&tracked.client_name) else {
            warn!(
                "Download client {} for '{}' is gone",
                tracked.client_name, tracked.item.title
            );
            return;
        };
        match client.remove_item(&tracked.download_id, true).await {
            Ok(()) => {
                debug!("Removed '{}' from {}", tracked.item.title, tracked.client_name);
                self.tracked.stop_tracking(&tracked.download_id);
            }
            Err(e) => warn!(
                "Couldn't remove '{}' from {}: {:#}",
                tracked.item.title, tracked.client_name, e
            ),
        }
    }
}
