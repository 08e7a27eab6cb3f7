//! Turns a batch of ranked download decisions into grabs.
//!
//! Within one pass the first grab for a media entity wins: later decisions
//! touching an already grabbed media id are skipped. Temporarily rejected
//! decisions are parked in the pending queue and reserve their media ids so
//! a lower-ranked release can't be grabbed in their place.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::error::DownloadServiceError;
use super::models::{DownloadDecision, DownloadProtocol, RemoteMedia};
use super::pending::{PendingReleaseReason, PendingReleaseStore};
use super::service::DownloadService;

/// Outcome of one dispatch pass.
#[derive(Debug, Default)]
pub struct ProcessedDecisions {
    pub grabbed: Vec<DownloadDecision>,
    pub pending: Vec<DownloadDecision>,
    pub rejected: Vec<DownloadDecision>,
}

pub struct ReleaseDispatcher {
    download_service: Arc<DownloadService>,
    pending: Arc<PendingReleaseStore>,
    preferred_protocol: Option<DownloadProtocol>,
}

impl ReleaseDispatcher {
    pub fn new(download_service: Arc<DownloadService>, pending: Arc<PendingReleaseStore>) -> Self {
        Self {
            download_service,
            pending,
            preferred_protocol: None,
        }
    }

    pub fn with_preferred_protocol(mut self, protocol: Option<DownloadProtocol>) -> Self {
        self.preferred_protocol = protocol;
        self
    }

    /// Orders decisions best first: quality, custom format score, revision,
    /// preferred protocol, then seeders (torrent) or age (usenet), then size.
    pub fn prioritize(&self, mut decisions: Vec<DownloadDecision>) -> Vec<DownloadDecision> {
        decisions.sort_by(|a, b| self.compare(&b.remote, &a.remote));
        decisions
    }

    fn compare(&self, a: &RemoteMedia, b: &RemoteMedia) -> Ordering {
        let protocol_rank = |r: &RemoteMedia| match self.preferred_protocol {
            Some(p) if p == r.release.protocol => 1,
            _ => 0,
        };
        // Newer releases rank higher.
        let freshness = |r: &RemoteMedia| -r.release.age_hours();

        a.quality
            .quality
            .cmp(&b.quality.quality)
            .then(a.custom_format_score.cmp(&b.custom_format_score))
            .then(a.quality.revision.cmp(&b.quality.revision))
            .then(protocol_rank(a).cmp(&protocol_rank(b)))
            .then_with(|| match (a.release.protocol, b.release.protocol) {
                (DownloadProtocol::Torrent, DownloadProtocol::Torrent) => {
                    a.release.seeders.cmp(&b.release.seeders)
                }
                _ => freshness(a).cmp(&freshness(b)),
            })
            .then(a.release.size.cmp(&b.release.size))
    }

    /// Dispatches decisions in the given order.
    pub async fn process_decisions(&self, decisions: Vec<DownloadDecision>) -> ProcessedDecisions {
        let mut result = ProcessedDecisions::default();
        let mut grabbed_ids: HashSet<i64> = HashSet::new();
        let mut pending_ids: HashSet<i64> = HashSet::new();

        for decision in decisions {
            let media_ids = decision.remote.media_ids();
            let title = decision.remote.release.title.clone();

            if decision.rejected() {
                debug!("Rejected '{}': {}", title, decision.rejection_summary());
                result.rejected.push(decision);
                continue;
            }

            if media_ids.iter().any(|id| grabbed_ids.contains(id)) {
                debug!("Skipping '{}', media already grabbed in this pass", title);
                continue;
            }

            if decision.temporarily_rejected() {
                let reason = if media_ids.iter().any(|id| pending_ids.contains(id)) {
                    PendingReleaseReason::Fallback
                } else {
                    PendingReleaseReason::Delay
                };
                self.park(&decision, reason);
                pending_ids.extend(media_ids.iter().copied());
                result.pending.push(decision);
                continue;
            }

            if media_ids.iter().any(|id| pending_ids.contains(id)) {
                debug!(
                    "Skipping '{}', a preferred release for the same media is pending",
                    title
                );
                continue;
            }

            match self.download_service.download_report(&decision.remote).await {
                Ok(_) => {
                    grabbed_ids.extend(media_ids.iter().copied());
                    result.grabbed.push(decision);
                }
                Err(DownloadServiceError::ClientUnavailable(protocol)) => {
                    warn!(
                        "No {} download client available for '{}', adding to pending",
                        protocol, title
                    );
                    self.park(&decision, PendingReleaseReason::DownloadClientUnavailable);
                    pending_ids.extend(media_ids.iter().copied());
                    result.pending.push(decision);
                }
                Err(e) => {
                    warn!("Couldn't add report to download queue. {}: {}", title, e);
                }
            }
        }

        if let Err(e) = self.pending.remove_rejected(&result.rejected) {
            error!("Failed to clear rejected pending releases: {}", e);
        }

        result
    }

    fn park(&self, decision: &DownloadDecision, reason: PendingReleaseReason) {
        if let Err(e) = self.pending.add(&decision.remote, reason) {
            error!(
                "Failed to add '{}' to pending releases: {}",
                decision.remote.release.title, e
            );
        }
    }
}
