//! History event types.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::qualities::QualityModel;

/// Keys used in [`HistoryEvent::data`].
pub mod data_keys {
    pub const INDEXER: &str = "indexer";
    pub const SIZE: &str = "size";
    pub const INDEXER_FLAGS: &str = "indexerFlags";
    pub const RELEASE_SOURCE: &str = "releaseSource";
    pub const DOWNLOAD_CLIENT: &str = "downloadClient";
    pub const DOWNLOAD_CLIENT_NAME: &str = "downloadClientName";
    pub const PUBLISHED_DATE: &str = "publishedDate";
    pub const GUID: &str = "guid";
    pub const PROTOCOL: &str = "protocol";
    pub const TORRENT_INFO_HASH: &str = "torrentInfoHash";
    pub const CUSTOM_FORMAT_SCORE: &str = "customFormatScore";
    pub const MESSAGE: &str = "message";
    pub const DROPPED_PATH: &str = "droppedPath";
    pub const IMPORTED_PATH: &str = "importedPath";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventType {
    Unknown,
    Grabbed,
    DownloadFolderImported,
    DownloadFailed,
}

impl HistoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::Unknown => "UNKNOWN",
            HistoryEventType::Grabbed => "GRABBED",
            HistoryEventType::DownloadFolderImported => "DOWNLOAD_FOLDER_IMPORTED",
            HistoryEventType::DownloadFailed => "DOWNLOAD_FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "GRABBED" => HistoryEventType::Grabbed,
            "DOWNLOAD_FOLDER_IMPORTED" => HistoryEventType::DownloadFolderImported,
            "DOWNLOAD_FAILED" => HistoryEventType::DownloadFailed,
            _ => HistoryEventType::Unknown,
        }
    }
}

/// One immutable history record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    /// Assigned by the store on append; 0 before that.
    pub id: i64,
    pub event_type: HistoryEventType,
    pub media_id: i64,
    pub download_id: Option<String>,
    pub source_title: String,
    pub quality: QualityModel,
    pub date: DateTime<Utc>,
    pub data: HashMap<String, String>,
}

impl HistoryEvent {
    pub fn new(event_type: HistoryEventType, media_id: i64, source_title: &str) -> Self {
        Self {
            id: 0,
            event_type,
            media_id,
            download_id: None,
            source_title: source_title.to_string(),
            quality: QualityModel::default(),
            date: Utc::now(),
            data: HashMap::new(),
        }
    }

    pub fn with_download_id(mut self, download_id: Option<String>) -> Self {
        self.download_id = download_id;
        self
    }

    pub fn with_quality(mut self, quality: QualityModel) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}
