//! Quality detection from release and file names.

use lazy_static::lazy_static;
use regex::Regex;

use crate::qualities::{Quality, QualityModel, QualitySource, Revision};

lazy_static! {
    static ref RESOLUTION_REGEX: Regex =
        Regex::new(r"(?i)\b(?:(?P<r480>480p|640x480|848x480)|(?P<r576>576p)|(?P<r720>720p|1280x720)|(?P<r1080>1080[pi]|1920x1080)|(?P<r2160>2160p|4k|uhd|3840x2160))\b").unwrap();
    static ref SOURCE_REGEX: Regex =
        Regex::new(r"(?i)\b(?:(?P<remux>remux)|(?P<bluray>blu-?ray|bd(?:rip)?|br-?rip)|(?P<webdl>web[-_. ]?dl|webrip|web|amzn|nf|dsnp)|(?P<hdtv>hdtv)|(?P<dvd>dvd(?:rip|r)?|xvidvd)|(?P<sdtv>sdtv|pdtv|tvrip))\b").unwrap();
    static ref PROPER_REGEX: Regex = Regex::new(r"(?i)\b(?P<proper>proper)\b").unwrap();
    static ref REPACK_REGEX: Regex = Regex::new(r"(?i)\b(?P<repack>repack|rerip)\b").unwrap();
    static ref VERSION_REGEX: Regex = Regex::new(r"(?i)\bv(?P<version>[2-4])\b").unwrap();
    static ref REAL_REGEX: Regex = Regex::new(r"\b(?P<real>REAL)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    R480,
    R576,
    R720,
    R1080,
    R2160,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Remux,
    Bluray,
    WebDl,
    Hdtv,
    Dvd,
    Sdtv,
}

fn parse_resolution(name: &str) -> Option<Resolution> {
    let caps = RESOLUTION_REGEX.captures(name)?;
    if caps.name("r2160").is_some() {
        Some(Resolution::R2160)
    } else if caps.name("r1080").is_some() {
        Some(Resolution::R1080)
    } else if caps.name("r720").is_some() {
        Some(Resolution::R720)
    } else if caps.name("r576").is_some() {
        Some(Resolution::R576)
    } else if caps.name("r480").is_some() {
        Some(Resolution::R480)
    } else {
        None
    }
}

/// Strongest source token anywhere in the name (remux beats bluray, etc).
fn parse_source(name: &str) -> Option<Source> {
    const PRIORITY: [(&str, Source); 6] = [
        ("remux", Source::Remux),
        ("bluray", Source::Bluray),
        ("webdl", Source::WebDl),
        ("hdtv", Source::Hdtv),
        ("dvd", Source::Dvd),
        ("sdtv", Source::Sdtv),
    ];

    SOURCE_REGEX
        .captures_iter(name)
        .filter_map(|caps| {
            PRIORITY
                .iter()
                .position(|(group, _)| caps.name(group).is_some())
        })
        .min()
        .map(|index| PRIORITY[index].1)
}

fn combine(source: Option<Source>, resolution: Option<Resolution>) -> Quality {
    use Resolution::*;
    match (source, resolution) {
        (Some(Source::Remux), Some(R2160)) => Quality::Remux2160p,
        (Some(Source::Remux), _) => Quality::Remux1080p,
        (Some(Source::Bluray), Some(R2160)) => Quality::Bluray2160p,
        (Some(Source::Bluray), Some(R1080)) => Quality::Bluray1080p,
        (Some(Source::Bluray), Some(R720)) => Quality::Bluray720p,
        (Some(Source::Bluray), _) => Quality::Dvd,
        (Some(Source::WebDl), Some(R2160)) => Quality::WebDl2160p,
        (Some(Source::WebDl), Some(R1080)) => Quality::WebDl1080p,
        (Some(Source::WebDl), Some(R720)) => Quality::WebDl720p,
        (Some(Source::WebDl), _) => Quality::WebDl480p,
        (Some(Source::Hdtv), Some(R2160)) => Quality::Hdtv2160p,
        (Some(Source::Hdtv), Some(R1080)) => Quality::Hdtv1080p,
        (Some(Source::Hdtv), Some(R720)) => Quality::Hdtv720p,
        (Some(Source::Hdtv), _) => Quality::Sdtv,
        (Some(Source::Dvd), _) => Quality::Dvd,
        (Some(Source::Sdtv), _) => Quality::Sdtv,
        (None, Some(R2160)) => Quality::WebDl2160p,
        (None, Some(R1080)) => Quality::Hdtv1080p,
        (None, Some(R720)) => Quality::Hdtv720p,
        (None, Some(R480 | R576)) => Quality::Sdtv,
        (None, None) => Quality::Unknown,
    }
}

fn quality_from_extension(name: &str) -> Option<Quality> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "avi" | "divx" | "xvid" | "wmv" | "mpg" | "mpeg" | "flv" => Some(Quality::Sdtv),
        "vob" | "iso" | "img" => Some(Quality::Dvd),
        "mkv" | "mp4" | "m4v" | "ts" | "webm" | "mov" => Some(Quality::Hdtv720p),
        "m2ts" => Some(Quality::Bluray720p),
        _ => None,
    }
}

pub fn parse_revision(name: &str) -> Revision {
    let mut revision = Revision::default();

    if PROPER_REGEX.is_match(name) {
        revision.version = 2;
    }
    if REPACK_REGEX.is_match(name) {
        revision.version = 2;
        revision.is_repack = true;
    }
    if let Some(version) = VERSION_REGEX
        .captures(name)
        .and_then(|c| c.name("version"))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        revision.version = version;
    }
    revision.real = REAL_REGEX.find_iter(name).count() as u32;

    revision
}

/// Parses a quality from a release title or file name.
///
/// Name tokens win; when none are present the file extension is used and the
/// result is tagged [`QualitySource::Extension`].
pub fn parse_quality(name: &str) -> QualityModel {
    let revision = parse_revision(name);
    let quality = combine(parse_source(name), parse_resolution(name));

    if quality != Quality::Unknown {
        return QualityModel::new(quality)
            .with_revision(revision)
            .with_source(QualitySource::Name);
    }

    match quality_from_extension(name) {
        Some(quality) => QualityModel::new(quality)
            .with_revision(revision)
            .with_source(QualitySource::Extension),
        None => QualityModel::new(Quality::Unknown).with_revision(revision),
    }
}

/// Quality implied by a video stream height, used when media info is known.
pub fn quality_from_height(height: u32, hint: Quality) -> Option<Quality> {
    let resolution = match height {
        0 => return None,
        1..=500 => Resolution::R480,
        501..=600 => Resolution::R576,
        601..=800 => Resolution::R720,
        801..=1200 => Resolution::R1080,
        _ => Resolution::R2160,
    };
    let source = match hint {
        Quality::Remux1080p | Quality::Remux2160p => Some(Source::Remux),
        Quality::Bluray720p | Quality::Bluray1080p | Quality::Bluray2160p => Some(Source::Bluray),
        Quality::WebDl480p | Quality::WebDl720p | Quality::WebDl1080p | Quality::WebDl2160p => {
            Some(Source::WebDl)
        }
        Quality::Dvd => Some(Source::Dvd),
        _ => Some(Source::Hdtv),
    };
    Some(combine(source, Some(resolution)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_qualities() {
        assert_eq!(
            parse_quality("Movie.Title.2020.1080p.BluRay.x264-GRP").quality,
            Quality::Bluray1080p
        );
        assert_eq!(
            parse_quality("Movie.Title.2020.720p.WEB-DL.DD5.1-GRP").quality,
            Quality::WebDl720p
        );
        assert_eq!(
            parse_quality("Movie Title 2020 2160p UHD BluRay REMUX").quality,
            Quality::Remux2160p
        );
        assert_eq!(
            parse_quality("Show.S01E01.HDTV.x264-GRP").quality,
            Quality::Sdtv
        );
        assert_eq!(
            parse_quality("Movie.Title.2020.DVDRip.XviD-GRP").quality,
            Quality::Dvd
        );
    }

    #[test]
    fn test_extension_fallback_is_tagged() {
        let q = parse_quality("some_random_name.mkv");
        assert_eq!(q.quality, Quality::Hdtv720p);
        assert_eq!(q.source, QualitySource::Extension);

        let q = parse_quality("Movie.2020.1080p.WEB-DL-GRP.mkv");
        assert_eq!(q.source, QualitySource::Name);
    }

    #[test]
    fn test_revision_parsing() {
        assert_eq!(parse_revision("Movie.2020.PROPER.1080p").version, 2);

        let repack = parse_revision("Movie.2020.REPACK.1080p");
        assert_eq!(repack.version, 2);
        assert!(repack.is_repack);

        assert_eq!(parse_revision("Movie.2020.REAL.PROPER.1080p").real, 1);
        assert_eq!(parse_revision("movie.2020.real.1080p").real, 0);
        assert_eq!(parse_revision("Show.S01E01.v3.720p").version, 3);
    }

    #[test]
    fn test_quality_from_height() {
        assert_eq!(
            quality_from_height(1080, Quality::Hdtv720p),
            Some(Quality::Hdtv1080p)
        );
        assert_eq!(
            quality_from_height(2160, Quality::Bluray1080p),
            Some(Quality::Bluray2160p)
        );
        assert_eq!(quality_from_height(0, Quality::Unknown), None);
    }
}
