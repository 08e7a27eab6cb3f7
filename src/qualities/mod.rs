//! Quality definitions and comparison rules.
//!
//! Qualities form a closed, totally ordered set. A `QualityModel` pairs a
//! quality with a `Revision` (proper/repack/real counters) and remembers how
//! the quality was detected, since extension-derived qualities are the
//! weakest signal.

mod custom_formats;

pub use custom_formats::{CustomFormat, CustomFormatScorer};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    Unknown,
    Sdtv,
    Dvd,
    WebDl480p,
    Hdtv720p,
    WebDl720p,
    Bluray720p,
    Hdtv1080p,
    WebDl1080p,
    Bluray1080p,
    Remux1080p,
    Hdtv2160p,
    WebDl2160p,
    Bluray2160p,
    Remux2160p,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::Sdtv => "SDTV",
            Quality::Dvd => "DVD",
            Quality::WebDl480p => "WEBDL-480p",
            Quality::Hdtv720p => "HDTV-720p",
            Quality::WebDl720p => "WEBDL-720p",
            Quality::Bluray720p => "Bluray-720p",
            Quality::Hdtv1080p => "HDTV-1080p",
            Quality::WebDl1080p => "WEBDL-1080p",
            Quality::Bluray1080p => "Bluray-1080p",
            Quality::Remux1080p => "Remux-1080p",
            Quality::Hdtv2160p => "HDTV-2160p",
            Quality::WebDl2160p => "WEBDL-2160p",
            Quality::Bluray2160p => "Bluray-2160p",
            Quality::Remux2160p => "Remux-2160p",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let all = [
            Quality::Unknown,
            Quality::Sdtv,
            Quality::Dvd,
            Quality::WebDl480p,
            Quality::Hdtv720p,
            Quality::WebDl720p,
            Quality::Bluray720p,
            Quality::Hdtv1080p,
            Quality::WebDl1080p,
            Quality::Bluray1080p,
            Quality::Remux1080p,
            Quality::Hdtv2160p,
            Quality::WebDl2160p,
            Quality::Bluray2160p,
            Quality::Remux2160p,
        ];
        all.into_iter().find(|q| q.as_str().eq_ignore_ascii_case(s))
    }

    /// Position in the ranking, higher is better.
    pub fn rank(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub version: u32,
    pub real: u32,
    pub is_repack: bool,
}

impl Default for Revision {
    fn default() -> Self {
        Self {
            version: 1,
            real: 0,
            is_repack: false,
        }
    }
}

impl Revision {
    pub fn new(version: u32, real: u32) -> Self {
        Self {
            version,
            real,
            is_repack: false,
        }
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.real
            .cmp(&other.real)
            .then(self.version.cmp(&other.version))
    }
}

/// How a quality was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualitySource {
    Name,
    Extension,
    MediaInfo,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityModel {
    pub quality: Quality,
    pub revision: Revision,
    #[serde(default)]
    pub source: QualitySource,
}

impl Default for QualityModel {
    fn default() -> Self {
        Self::new(Quality::Unknown)
    }
}

impl QualityModel {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            revision: Revision::default(),
            source: QualitySource::Unknown,
        }
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_source(mut self, source: QualitySource) -> Self {
        self.source = source;
        self
    }

    /// Equality on quality and revision, ignoring how it was detected.
    pub fn same_as(&self, other: &QualityModel) -> bool {
        self.quality == other.quality && self.revision == other.revision
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

impl fmt::Display for QualityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.quality, self.revision.version)?;
        if self.revision.real > 0 {
            write!(f, " REAL")?;
        }
        Ok(())
    }
}

/// Proper/repack handling preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProperDownloadPolicy {
    #[default]
    PreferAndUpgrade,
    DoNotUpgrade,
    DoNotPrefer,
}

impl ProperDownloadPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "prefer_and_upgrade" => Some(Self::PreferAndUpgrade),
            "do_not_upgrade" => Some(Self::DoNotUpgrade),
            "do_not_prefer" => Some(Self::DoNotPrefer),
            _ => None,
        }
    }

    pub fn compares_revisions(&self) -> bool {
        matches!(self, Self::PreferAndUpgrade)
    }
}

/// Lexicographic upgrade key: format score, then quality, then revision
/// (only when the policy prefers propers).
pub fn compare_for_upgrade(
    candidate: (&QualityModel, i32),
    existing: (&QualityModel, i32),
    policy: ProperDownloadPolicy,
) -> Ordering {
    let (candidate_quality, candidate_score) = candidate;
    let (existing_quality, existing_score) = existing;

    let ordering = candidate_score
        .cmp(&existing_score)
        .then(candidate_quality.quality.cmp(&existing_quality.quality));

    if policy.compares_revisions() {
        ordering.then(candidate_quality.revision.cmp(&existing_quality.revision))
    } else {
        ordering
    }
}
