//! Release and decision types shared by the dispatch layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::library::Media;
use crate::parser::ParsedMediaInfo;
use crate::qualities::QualityModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadProtocol {
    Torrent,
    Usenet,
    DirectConnect,
}

impl DownloadProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadProtocol::Torrent => "torrent",
            DownloadProtocol::Usenet => "usenet",
            DownloadProtocol::DirectConnect => "direct_connect",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "torrent" => Some(DownloadProtocol::Torrent),
            "usenet" => Some(DownloadProtocol::Usenet),
            "direct_connect" | "direct" => Some(DownloadProtocol::DirectConnect),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a release came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReleaseSource {
    #[default]
    Unknown,
    Rss,
    Search,
    UserInvokedSearch,
    InteractiveSearch,
}

impl ReleaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseSource::Unknown => "Unknown",
            ReleaseSource::Rss => "Rss",
            ReleaseSource::Search => "Search",
            ReleaseSource::UserInvokedSearch => "UserInvokedSearch",
            ReleaseSource::InteractiveSearch => "InteractiveSearch",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Rss" => ReleaseSource::Rss,
            "Search" => ReleaseSource::Search,
            "UserInvokedSearch" => ReleaseSource::UserInvokedSearch,
            "InteractiveSearch" => ReleaseSource::InteractiveSearch,
            _ => ReleaseSource::Unknown,
        }
    }
}

/// A candidate item offered by an indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub guid: String,
    pub title: String,
    pub size: u64,
    /// Torrent file, NZB, or direct link. May itself be a magnet link.
    pub download_url: Option<String>,
    pub magnet_url: Option<String>,
    pub info_hash: Option<String>,
    pub indexer: String,
    pub indexer_id: i64,
    pub protocol: DownloadProtocol,
    pub publish_date: DateTime<Utc>,
    pub seeders: Option<u32>,
    pub indexer_flags: u32,
    pub release_source: ReleaseSource,
}

impl ReleaseInfo {
    pub fn new(title: &str, protocol: DownloadProtocol) -> Self {
        Self {
            guid: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            size: 0,
            download_url: None,
            magnet_url: None,
            info_hash: None,
            indexer: String::new(),
            indexer_id: 0,
            protocol,
            publish_date: Utc::now(),
            seeders: None,
            indexer_flags: 0,
            release_source: ReleaseSource::Unknown,
        }
    }

    pub fn age_hours(&self) -> i64 {
        (Utc::now() - self.publish_date).num_hours()
    }
}

impl fmt::Display for ReleaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.indexer, self.title)
    }
}

/// A release matched to the media it would satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMedia {
    pub release: ReleaseInfo,
    pub parsed_info: Option<ParsedMediaInfo>,
    pub media: Vec<Media>,
    pub quality: QualityModel,
    pub custom_format_score: i32,
}

impl RemoteMedia {
    pub fn media_ids(&self) -> Vec<i64> {
        self.media.iter().map(|m| m.id).collect()
    }
}

impl fmt::Display for RemoteMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.release.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionType {
    Permanent,
    /// Not grabbable now, may be later (delay profiles, busy client).
    Temporary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRejection {
    pub reason: String,
    pub kind: RejectionType,
}

/// Ranking verdict for one release, produced upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadDecision {
    pub remote: RemoteMedia,
    pub rejections: Vec<DecisionRejection>,
}

impl DownloadDecision {
    pub fn new(remote: RemoteMedia) -> Self {
        Self {
            remote,
            rejections: Vec::new(),
        }
    }

    pub fn with_rejection(mut self, reason: &str, kind: RejectionType) -> Self {
        self.rejections.push(DecisionRejection {
            reason: reason.to_string(),
            kind,
        });
        self
    }

    pub fn approved(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn temporarily_rejected(&self) -> bool {
        !self.rejections.is_empty()
            && self
                .rejections
                .iter()
                .all(|r| r.kind == RejectionType::Temporary)
    }

    pub fn rejected(&self) -> bool {
        self.rejections
            .iter()
            .any(|r| r.kind == RejectionType::Permanent)
    }

    pub fn rejection_summary(&self) -> String {
        self.rejections
            .iter()
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
