//! Tracked downloads: download client jobs correlated with our grabs.
//!
//! ```text
//! Downloading -> ImportPending -> Importing -> Imported | ImportFailed
//! Downloading -> FailedPending -> Failed
//! ```

mod completed;
mod failed;
mod models;
mod processor;
mod service;
mod store;

pub use completed::CompletedDownloadService;
pub use failed::FailedDownloadService;
pub use models::{StatusMessage, TrackedDownload, TrackedDownloadState};
pub use processor::DownloadMonitor;
pub use service::TrackedDownloadService;
pub use store::TrackedDownloadStore;
