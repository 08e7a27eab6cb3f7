//! Title, year, release group and unit parsing.

use lazy_static::lazy_static;
use regex::Regex;

use super::quality::parse_quality;
use super::scene::remove_file_extension;
use crate::qualities::QualityModel;

lazy_static! {
    static ref MOVIE_REGEX: Regex = Regex::new(
        r"^(?P<title>.+?)[._ \-(\[]+(?P<year>(?:19|20)\d{2})(?:[._ )\]\-]|$)"
    )
    .unwrap();
    static ref EPISODE_REGEX: Regex =
        Regex::new(r"(?i)^(?P<title>.*?)[._ \-]*\bS(?P<season>\d{1,2})E(?P<unit>\d{1,3})").unwrap();
    static ref TRACK_REGEX: Regex =
        Regex::new(r"^(?P<unit>\d{1,3})[._ \-]+(?P<title>.*\D.*)$").unwrap();
    static ref QUALITY_TOKEN_REGEX: Regex = Regex::new(
        r"(?i)^(?P<title>.+?)[._ \-]+(?:480p|576p|720p|1080[pi]|2160p|4k|blu-?ray|web[-_. ]?dl|webrip|hdtv|dvd(?:rip)?|remux|proper|repack)\b"
    )
    .unwrap();
    static ref RELEASE_GROUP_REGEX: Regex =
        Regex::new(r"-(?P<group>[A-Za-z0-9]+)(?:\[[^\]]+\])?$").unwrap();
    static ref WORD_SPLIT_REGEX: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

const INVALID_GROUPS: &[&str] = &["dl", "rip", "web", "x264", "x265", "h264", "h265"];

/// What could be read from a release title or file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMediaInfo {
    pub title: String,
    pub year: Option<u32>,
    pub release_group: Option<String>,
    pub quality: QualityModel,
    /// Episode or track number, when the name carries one.
    pub unit: Option<u32>,
}

impl ParsedMediaInfo {
    pub fn clean_title(&self) -> String {
        clean_title(&self.title)
    }
}

/// Normalizes a title for comparison: lowercase alphanumerics only, without
/// leading articles.
pub fn clean_title(title: &str) -> String {
    let lower = title.to_lowercase().replace('&', " and ");
    WORD_SPLIT_REGEX
        .split(&lower)
        .filter(|w| !w.is_empty())
        .enumerate()
        .filter(|(i, w)| !(*i == 0 && matches!(*w, "the" | "a" | "an")))
        .map(|(_, w)| w)
        .collect::<Vec<_>>()
        .join("")
}

fn normalize_title(raw: &str) -> String {
    raw.replace(['.', '_'], " ")
        .trim_matches(|c: char| c == '-' || c == '(' || c == '[' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_release_group(name: &str) -> Option<String> {
    let stem = remove_file_extension(name);
    let group = RELEASE_GROUP_REGEX
        .captures(stem.trim())?
        .name("group")?
        .as_str();

    if group.chars().all(|c| c.is_ascii_digit())
        || INVALID_GROUPS.contains(&group.to_ascii_lowercase().as_str())
    {
        return None;
    }
    Some(group.to_string())
}

/// Parses a release title or a file name. Returns `None` when no title can
/// be found.
pub fn parse_title(name: &str) -> Option<ParsedMediaInfo> {
    let stem = remove_file_extension(name.trim());
    if stem.is_empty() {
        return None;
    }

    let quality = parse_quality(name);
    let release_group = parse_release_group(stem);

    let (raw_title, year, unit) = if let Some(caps) = EPISODE_REGEX.captures(stem) {
        let unit = caps["unit"].parse::<u32>().ok();
        (caps["title"].to_string(), None, unit)
    } else if let Some(caps) = MOVIE_REGEX.captures(stem) {
        let year = caps["year"].parse::<u32>().ok();
        (caps["title"].to_string(), year, None)
    } else if let Some(caps) = TRACK_REGEX.captures(stem) {
        let unit = caps["unit"].parse::<u32>().ok();
        (caps["title"].to_string(), None, unit)
    } else if let Some(caps) = QUALITY_TOKEN_REGEX.captures(stem) {
        (caps["title"].to_string(), None, None)
    } else {
        (stem.to_string(), None, None)
    };

    let title = normalize_title(&raw_title);
    if !title.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    Some(ParsedMediaInfo {
        title,
        year,
        release_group,
        quality,
        unit,
    })
}
