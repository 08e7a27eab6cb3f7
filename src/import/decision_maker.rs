//! Builds a [`LocalMediaFile`] per candidate and runs the specification
//! pipeline over it.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::aggregation::{aggregate, AggregationContext};
use super::disk::DiskProvider;
use super::media_info::MediaInfoReader;
use super::models::{ImportDecision, ImportRejection, LocalMediaFile};
use super::sample::{detect_sample, SampleVerdict};
use super::specification::{default_specifications, ImportContext, ImportSpecification, SpecDecision};
use crate::config::ImportSettings;
use crate::download::DownloadClientItem;
use crate::history::HistoryStore;
use crate::library::{LibraryStore, Media};
use crate::parser::{parse_title, ParsedMediaInfo};
use crate::qualities::CustomFormatScorer;

/// What a decision pass runs over.
#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub video_files: Vec<PathBuf>,
    /// Media the files may belong to.
    pub candidates: &'a [Media],
    pub download_item: Option<&'a DownloadClientItem>,
    /// Folder being imported; `None` for a single file.
    pub folder: Option<&'a Path>,
    pub has_extras: bool,
    /// Files already in the library folder.
    pub existing_files: bool,
}

impl<'a> ImportRequest<'a> {
    pub fn new(video_files: Vec<PathBuf>, candidates: &'a [Media]) -> Self {
        Self {
            video_files,
            candidates,
            download_item: None,
            folder: None,
            has_extras: false,
            existing_files: false,
        }
    }

    pub fn with_download_item(mut self, item: Option<&'a DownloadClientItem>) -> Self {
        self.download_item = item;
        self
    }

    pub fn with_folder(mut self, folder: Option<&'a Path>) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_extras(mut self, has_extras: bool) -> Self {
        self.has_extras = has_extras;
        self
    }
}

pub struct ImportDecisionMaker {
    specifications: Vec<Box<dyn ImportSpecification>>,
    history: Arc<dyn HistoryStore>,
    library: Arc<dyn LibraryStore>,
    disk: Arc<dyn DiskProvider>,
    media_info: Arc<dyn MediaInfoReader>,
    scorer: Arc<CustomFormatScorer>,
    settings: ImportSettings,
}

impl ImportDecisionMaker {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        library: Arc<dyn LibraryStore>,
        disk: Arc<dyn DiskProvider>,
        media_info: Arc<dyn MediaInfoReader>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            specifications: default_specifications(),
            history,
            library,
            disk,
            media_info,
            scorer: Arc::new(CustomFormatScorer::default()),
            settings,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<CustomFormatScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_specifications(mut self, specifications: Vec<Box<dyn ImportSpecification>>) -> Self {
        self.specifications = specifications;
        self
    }

    /// Decisions for files already sitting in `media`'s folder.
    pub async fn import_decisions_for_existing(
        &self,
        media: &Media,
        paths: Vec<PathBuf>,
    ) -> Vec<ImportDecision> {
        let candidates = std::slice::from_ref(media);
        let mut request = ImportRequest::new(paths, candidates);
        request.existing_files = true;
        self.get_import_decisions(request).await
    }

    /// One decision per video file, in input order. Never fails: problems
    /// with a file become rejections on that file's decision.
    pub async fn get_import_decisions(&self, request: ImportRequest<'_>) -> Vec<ImportDecision> {
        let download_info = request
            .download_item
            .and_then(|item| parse_title(&item.title));

        let mut built: Vec<Result<LocalMediaFile, ImportDecision>> =
            Vec::with_capacity(request.video_files.len());
        for path in &request.video_files {
            match self.build_local(path, &request, download_info.as_ref()).await {
                Ok(local) => built.push(Ok(local)),
                Err(e) => {
                    warn!("Couldn't import file {:?}: {:#}", path, e);
                    built.push(Err(ImportDecision::new(
                        LocalMediaFile::new(path.clone(), 0),
                        vec![ImportRejection::new("Unexpected error processing file")],
                    )));
                }
            }
        }

        self.attach_folder_info(&mut built, &request);

        let folder_name = request
            .folder
            .and_then(|f| f.file_name())
            .and_then(|n| n.to_str());
        let aggregation = AggregationContext {
            download_title: request.download_item.map(|i| i.title.as_str()),
            folder_name,
            video_file_count: request.video_files.len(),
            has_extras: request.has_extras,
            scorer: &self.scorer,
        };
        let ctx = ImportContext {
            download_item: request.download_item,
            video_files: &request.video_files,
            history: self.history.as_ref(),
            library: self.library.as_ref(),
            disk: self.disk.as_ref(),
            settings: &self.settings,
        };

        built
            .into_iter()
            .map(|entry| match entry {
                Ok(local) => self.decide(local, &aggregation, &ctx),
                Err(decision) => decision,
            })
            .collect()
    }

    async fn build_local(
        &self,
        path: &Path,
        request: &ImportRequest<'_>,
        download_info: Option<&ParsedMediaInfo>,
    ) -> Result<LocalMediaFile> {
        let size = self.disk.file_size(path)?;
        let mut local = LocalMediaFile::new(path.to_path_buf(), size);
        local.existing_file = request.existing_files;
        local.parsed_info = parse_title(&local.file_name());
        local.download_info = download_info.cloned();

        local.media_info = match self.media_info.read(path).await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("No media info for {:?}: {}", path, e);
                None
            }
        };

        local.media = if request.existing_files {
            request.candidates.first().cloned()
        } else {
            let by_file = local
                .parsed_info
                .as_ref()
                .and_then(|info| match_media(info, request.candidates));
            by_file.or_else(|| {
                local
                    .download_info
                    .as_ref()
                    .and_then(|info| match_media(info, request.candidates))
            })
        };
        Ok(local)
    }

    /// Folder info only describes the file when the folder holds a single
    /// real video, otherwise season or collection folders would leak their
    /// identity onto every file.
    fn attach_folder_info(
        &self,
        built: &mut [Result<LocalMediaFile, ImportDecision>],
        request: &ImportRequest<'_>,
    ) {
        let Some(folder_info) = request
            .folder
            .and_then(|f| f.file_name())
            .and_then(|n| n.to_str())
            .and_then(parse_title)
        else {
            return;
        };

        // Files the name didn't match are judged against the folder's media;
        // with neither there is nothing to size them against.
        let folder_media = match_media(&folder_info, request.candidates);
        let eligible = built
            .iter()
            .filter_map(|entry| entry.as_ref().ok())
            .filter(|local| {
                local.media.as_ref().or(folder_media.as_ref()).is_some_and(|media| {
                    detect_sample(&local.path, local.size, local.media_info.as_ref(), media)
                        == SampleVerdict::NotSample
                })
            })
            .count();
        if eligible != 1 {
            return;
        }

        for local in built.iter_mut().filter_map(|entry| entry.as_mut().ok()) {
            local.folder_info = Some(folder_info.clone());
            if local.media.is_none() && !request.existing_files {
                local.media = folder_media.clone();
            }
        }
    }

    fn decide(
        &self,
        mut local: LocalMediaFile,
        aggregation: &AggregationContext<'_>,
        ctx: &ImportContext<'_>,
    ) -> ImportDecision {
        if local.media.is_none() {
            let reason = if local.parsed_info.is_none()
                && local.folder_info.is_none()
                && local.download_info.is_none()
            {
                "Unable to parse file"
            } else {
                "Unknown media"
            };
            return ImportDecision::new(local, vec![ImportRejection::new(reason)]);
        }

        aggregate(&mut local, aggregation);

        let rejections = self
            .specifications
            .iter()
            .filter_map(|spec| match spec.evaluate(&local, ctx) {
                Ok(SpecDecision::Accept) => None,
                Ok(SpecDecision::Reject(reason)) => {
                    debug!("{} rejected by {}: {}", local, spec.name(), reason);
                    Some(ImportRejection::new(reason))
                }
                Err(e) => {
                    warn!("{} failed for {}: {:#}", spec.name(), local, e);
                    Some(ImportRejection::new("Unexpected error processing file"))
                }
            })
            .collect();

        ImportDecision::new(local, rejections)
    }
}

/// A single candidate matches anything parseable; otherwise by clean title,
/// and by year when both sides have one.
pub fn match_media(info: &ParsedMediaInfo, candidates: &[Media]) -> Option<Media> {
    if let [only] = candidates {
        return Some(only.clone());
    }
    let title = info.clean_title();
    candidates
        .iter()
        .find(|media| {
            crate::parser::clean_title(&media.title) == title
                && match (info.year, media.year) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
        .cloned()
}
