//! Release dispatch and download tracking.
//!
//! Layout:
//! - [`dispatcher`]: batch grab of ranked decisions.
//! - [`service`]: single release to its protocol's client, indexer health.
//! - [`protocol`]: magnet / torrent / nzb / link resolution per protocol.
//! - [`blackhole`]: watch-folder download clients.
//! - [`tracked`]: state machine over jobs reported by download clients.

pub mod blackhole;
pub mod client;
pub mod dispatcher;
mod error;
pub mod http;
pub mod indexer_status;
mod models;
pub mod pending;
pub mod protocol;
pub mod rate_limit;
pub mod service;
pub mod tracked;

pub use blackhole::WatchFolderClient;
pub use client::{DownloadClient, DownloadClientItem, DownloadClientProvider, DownloadItemStatus};
pub use dispatcher::{ProcessedDecisions, ReleaseDispatcher};
pub use error::{DownloadServiceError, ReleaseDownloadError};
pub use http::{HttpFetch, HttpFetcher};
pub use indexer_status::IndexerStatusService;
pub use models::{
    DecisionRejection, DownloadDecision, DownloadProtocol, RejectionType, ReleaseInfo,
    ReleaseSource, RemoteMedia,
};
pub use pending::{PendingRelease, PendingReleaseReason, PendingReleaseStore};
pub use service::DownloadService;
