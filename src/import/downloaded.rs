//! Decide-then-import over a finished download's output.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::decision_maker::{ImportDecisionMaker, ImportRequest};
use super::disk::DiskProvider;
use super::executor::ImportExecutor;
use super::models::{ImportDecision, ImportRejection, ImportResult, LocalMediaFile};
use crate::download::DownloadClientItem;
use crate::library::Media;
use crate::parser::is_video_file;

/// Files that ride along with a video without making the job "mixed".
const SIDECAR_EXTENSIONS: &[&str] = &[
    "nfo", "srt", "sub", "idx", "ass", "ssa", "sfv", "txt", "jpg", "jpeg", "png", "nzb",
];

pub struct DownloadedMediaImportService {
    decision_maker: Arc<ImportDecisionMaker>,
    executor: Arc<ImportExecutor>,
    disk: Arc<dyn DiskProvider>,
}

impl DownloadedMediaImportService {
    pub fn new(
        decision_maker: Arc<ImportDecisionMaker>,
        executor: Arc<ImportExecutor>,
        disk: Arc<dyn DiskProvider>,
    ) -> Self {
        Self {
            decision_maker,
            executor,
            disk,
        }
    }

    /// Imports a download's folder or single file for `media`.
    pub async fn process_path(
        &self,
        path: &Path,
        download_item: Option<&DownloadClientItem>,
        client_name: Option<&str>,
        media: &[Media],
    ) -> Vec<ImportResult> {
        if !self.disk.exists(path) {
            return vec![Self::failed_path(path, "Path does not exist")];
        }

        let (video_files, folder, has_extras) = if self.disk.is_dir(path) {
            let has_extras = self
                .disk
                .get_files(path)
                .iter()
                .any(|f| !is_video_file(f) && !is_sidecar(f));
            (self.disk.get_video_files(path), Some(path), has_extras)
        } else if is_video_file(path) {
            (vec![path.to_path_buf()], None, false)
        } else {
            return vec![Self::failed_path(path, "Not a video file")];
        };

        debug!(
            "Processing {:?}: {} video file(s), extras: {}",
            path,
            video_files.len(),
            has_extras
        );

        let request = ImportRequest::new(video_files, media)
            .with_download_item(download_item)
            .with_folder(folder)
            .with_extras(has_extras);
        let decisions = self.decision_maker.get_import_decisions(request).await;
        let results = self.executor.import(decisions, download_item, client_name);

        info!(
            "Import of {:?}: {} imported, {} not imported",
            path,
            results
                .iter()
                .filter(|r| r.result == super::models::ImportResultType::Imported)
                .count(),
            results
                .iter()
                .filter(|r| r.result != super::models::ImportResultType::Imported)
                .count()
        );
        results
    }

    fn failed_path(path: &Path, reason: &str) -> ImportResult {
        ImportResult::rejected(ImportDecision::new(
            LocalMediaFile::new(path.to_path_buf(), 0),
            vec![ImportRejection::new(reason)],
        ))
    }
}

fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SIDECAR_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
