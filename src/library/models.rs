use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::qualities::QualityModel;

/// A library entity files are imported for.
///
/// Media rows are owned by the metadata side; this crate reads them and links
/// files to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub id: i64,
    pub title: String,
    pub year: Option<u32>,
    /// Parent collection (series, artist, movie collection), if any.
    pub collection_id: Option<i64>,
    /// Folder files are imported into.
    pub path: PathBuf,
    /// Library root used for free-space checks.
    pub root_folder: PathBuf,
    /// Expected runtime of one unit, 0 when unknown.
    pub runtime_minutes: u32,
    /// Number of monitored sub-units (1 for a movie).
    pub monitored_unit_count: u32,
    pub monitored: bool,
}

impl Media {
    pub fn new(id: i64, title: &str, path: PathBuf) -> Self {
        let root_folder = path.parent().map(PathBuf::from).unwrap_or_else(|| path.clone());
        Self {
            id,
            title: title.to_string(),
            year: None,
            collection_id: None,
            path,
            root_folder,
            runtime_minutes: 0,
            monitored_unit_count: 1,
            monitored: true,
        }
    }
}

/// Stream details read from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub runtime_seconds: Option<f64>,
    pub video_codec: Option<String>,
    pub height: Option<u32>,
    pub audio_stream_count: u32,
    pub audio_codec: Option<String>,
}

/// A file linked to a media entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub id: i64,
    pub media_id: i64,
    pub relative_path: String,
    pub size: u64,
    pub quality: QualityModel,
    pub media_info: Option<MediaInfo>,
    pub release_group: Option<String>,
    pub scene_name: Option<String>,
    pub custom_format_score: i32,
    /// Episode or track number for multi-unit media.
    pub unit: Option<u32>,
    pub date_added: DateTime<Utc>,
}

impl MediaFile {
    pub fn full_path(&self, media: &Media) -> PathBuf {
        media.path.join(&self.relative_path)
    }
}
