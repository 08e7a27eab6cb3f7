//! File-name helpers: known extensions, scene-style detection, safe names.

use std::path::Path;

use super::title::parse_title;
use crate::qualities::{Quality, QualitySource};

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "avi", "wmv", "mov", "ts", "m2ts", "mpg", "mpeg", "webm", "flv", "divx",
    "xvid", "iso", "img", "vob", "strm",
];

/// Extensions that may trail a release title without being part of it.
const STRIPPABLE_EXTENSIONS: &[&str] = &[
    "nzb", "torrent", "magnet", "par2", "nfo", "sfv", "srt", "sub", "idx", "txt", "rar", "zip",
    "flac", "mp3", "m4a", "ogg",
];

fn is_known_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str()) || STRIPPABLE_EXTENSIONS.contains(&ext.as_str())
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Removes one known extension, if present.
pub fn remove_file_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_known_extension(ext) => stem,
        _ => name,
    }
}

/// Removes every trailing known extension (`x.mkv.nzb` -> `x`).
pub fn strip_trailing_extensions(name: &str) -> &str {
    let mut current = name.trim();
    loop {
        let next = remove_file_extension(current);
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

/// A scene-style name is dotted, has no spaces, and carries both a release
/// group and a quality read from the name itself.
pub fn is_scene_title(name: &str) -> bool {
    let name = strip_trailing_extensions(name);
    if !name.contains('.') || name.contains(' ') {
        return false;
    }
    match parse_title(name) {
        Some(info) => {
            info.release_group.is_some()
                && info.quality.quality != Quality::Unknown
                && info.quality.source == QualitySource::Name
        }
        None => false,
    }
}

/// Makes a title usable as a file name on every platform.
pub fn safe_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    cleaned.trim_matches(|c: char| c == '.' || c == ' ').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_trailing_extensions() {
        assert_eq!(
            strip_trailing_extensions("Movie.Title.2020.1080p-GRP.nzb"),
            "Movie.Title.2020.1080p-GRP"
        );
        assert_eq!(
            strip_trailing_extensions("Movie.Title.2020.1080p-GRP.mkv.torrent"),
            "Movie.Title.2020.1080p-GRP"
        );
        assert_eq!(
            strip_trailing_extensions("Movie.Title.2020.1080p-GRP"),
            "Movie.Title.2020.1080p-GRP"
        );
    }

    #[test]
    fn test_is_scene_title() {
        assert!(is_scene_title("Movie.Title.2020.1080p.BluRay.x264-GRP"));
        assert!(is_scene_title("Movie.Title.2020.1080p-GRP.mkv"));
        assert!(!is_scene_title("Movie Title 2020 1080p-GRP"));
        assert!(!is_scene_title("movie.title.2020"));
        assert!(!is_scene_title("random_file.mkv"));
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Movie: Title? 2020"), "Movie Title 2020");
        assert_eq!(safe_file_name("...Release/Name..."), "Release Name");
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("/a/b/movie.MKV")));
        assert!(!is_video_file(Path::new("/a/b/movie.nfo")));
        assert!(!is_video_file(Path::new("/a/b/movie")));
    }
}
