//! The import specification seam.
//!
//! Every specification is an independent predicate over one candidate file.
//! The decision maker runs all of them and collects every rejection.

use anyhow::Result;
use std::path::PathBuf;

use super::disk::DiskProvider;
use super::models::LocalMediaFile;
use super::specifications;
use crate::config::ImportSettings;
use crate::download::DownloadClientItem;
use crate::history::HistoryStore;
use crate::library::LibraryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecDecision {
    Accept,
    Reject(String),
}

impl SpecDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        SpecDecision::Reject(reason.into())
    }
}

/// What a specification may look at besides the file itself.
pub struct ImportContext<'a> {
    /// The download client job the files came from, if any.
    pub download_item: Option<&'a DownloadClientItem>,
    /// Every video file considered in this pass.
    pub video_files: &'a [PathBuf],
    pub history: &'a dyn HistoryStore,
    pub library: &'a dyn LibraryStore,
    pub disk: &'a dyn DiskProvider,
    pub settings: &'a ImportSettings,
}

pub trait ImportSpecification: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` means the specification itself failed; the file is then
    /// rejected as an unexpected error.
    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision>;
}

/// The standard pipeline, in evaluation order.
pub fn default_specifications() -> Vec<Box<dyn ImportSpecification>> {
    vec![
        Box::new(specifications::NotSampleSpecification),
        Box::new(specifications::HasAudioTrackSpecification),
        Box::new(specifications::NotUnpackingSpecification),
        Box::new(specifications::NotMultiPartSpecification),
        Box::new(specifications::MatchesFolderSpecification),
        Box::new(specifications::MatchesGrabSpecification),
        Box::new(specifications::AlreadyImportedSpecification),
        Box::new(specifications::GrabbedReleaseQualitySpecification),
        Box::new(specifications::FreeSpaceSpecification),
        Box::new(specifications::UpgradeSpecification),
        Box::new(specifications::SameFileSpecification),
    ]
}

/// Test scaffolding shared by the specification tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::history::SqliteHistoryStore;
    use crate::import::disk::LocalDiskProvider;
    use crate::library::{Media, SqliteLibraryStore};
    use crate::parser::parse_title;
    use crate::qualities::QualityModel;
    use std::path::Path;

    pub struct Harness {
        pub history: SqliteHistoryStore,
        pub library: SqliteLibraryStore,
        pub disk: LocalDiskProvider,
        pub settings: ImportSettings,
        pub video_files: Vec<PathBuf>,
        pub item: Option<DownloadClientItem>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                history: SqliteHistoryStore::in_memory().unwrap(),
                library: SqliteLibraryStore::in_memory().unwrap(),
                disk: LocalDiskProvider::new(),
                settings: ImportSettings::default(),
                video_files: Vec::new(),
                item: None,
            }
        }

        pub fn ctx(&self) -> ImportContext<'_> {
            ImportContext {
                download_item: self.item.as_ref(),
                video_files: &self.video_files,
                history: &self.history,
                library: &self.library,
                disk: &self.disk,
                settings: &self.settings,
            }
        }

        /// Adds a media row and returns it with its assigned id.
        pub fn add_media(&self, title: &str) -> Media {
            let mut media = Media::new(0, title, PathBuf::from(format!("/library/{}", title)));
            media.id = self.library.add_media(&media).unwrap();
            media
        }
    }

    pub fn local_for(path: &str, size: u64, media: &Media) -> LocalMediaFile {
        let path = Path::new(path);
        let mut local = LocalMediaFile::new(path.to_path_buf(), size);
        local.parsed_info = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_title);
        local.quality = local
            .parsed_info
            .as_ref()
            .map(|i| i.quality)
            .unwrap_or_else(QualityModel::default);
        local.unit = local.parsed_info.as_ref().and_then(|i| i.unit);
        local.media = Some(media.clone());
        local
    }
}
