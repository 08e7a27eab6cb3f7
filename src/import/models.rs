use std::fmt;
use std::path::PathBuf;

use crate::library::{Media, MediaFile, MediaInfo};
use crate::parser::ParsedMediaInfo;
use crate::qualities::QualityModel;

/// A candidate file considered for import, built fresh for each pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMediaFile {
    pub path: PathBuf,
    pub size: u64,
    pub parsed_info: Option<ParsedMediaInfo>,
    /// Parsed from the containing folder, only when it holds a single video.
    pub folder_info: Option<ParsedMediaInfo>,
    /// Parsed from the download client's job title.
    pub download_info: Option<ParsedMediaInfo>,
    pub quality: QualityModel,
    pub media_info: Option<MediaInfo>,
    pub media: Option<Media>,
    /// Already linked to the library; re-scan rather than new download.
    pub existing_file: bool,
    pub scene_name: Option<String>,
    pub release_group: Option<String>,
    pub custom_format_score: i32,
    pub unit: Option<u32>,
}

impl LocalMediaFile {
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            parsed_info: None,
            folder_info: None,
            download_info: None,
            quality: QualityModel::default(),
            media_info: None,
            media: None,
            existing_file: false,
            scene_name: None,
            release_group: None,
            custom_format_score: 0,
            unit: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for LocalMediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRejection {
    pub reason: String,
}

impl ImportRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Verdict for one candidate file. Approved iff there are no rejections.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecision {
    pub local: LocalMediaFile,
    pub rejections: Vec<ImportRejection>,
}

impl ImportDecision {
    pub fn new(local: LocalMediaFile, rejections: Vec<ImportRejection>) -> Self {
        Self { local, rejections }
    }

    pub fn approved(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn rejection_reasons(&self) -> Vec<String> {
        self.rejections.iter().map(|r| r.reason.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResultType {
    Imported,
    Rejected,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub decision: ImportDecision,
    pub result: ImportResultType,
    pub errors: Vec<String>,
    /// Set for imported results.
    pub media_file: Option<MediaFile>,
}

impl ImportResult {
    pub fn imported(decision: ImportDecision, media_file: MediaFile) -> Self {
        Self {
            decision,
            result: ImportResultType::Imported,
            errors: Vec::new(),
            media_file: Some(media_file),
        }
    }

    pub fn rejected(decision: ImportDecision) -> Self {
        let errors = decision.rejection_reasons();
        Self {
            decision,
            result: ImportResultType::Rejected,
            errors,
            media_file: None,
        }
    }

    /// An approved file that couldn't be put in place.
    pub fn failed(decision: ImportDecision, error: String) -> Self {
        Self {
            decision,
            result: ImportResultType::Rejected,
            errors: vec![error],
            media_file: None,
        }
    }

    pub fn skipped(decision: ImportDecision, error: &str) -> Self {
        Self {
            decision,
            result: ImportResultType::Skipped,
            errors: vec![error.to_string()],
            media_file: None,
        }
    }
}
