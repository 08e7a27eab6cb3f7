//! Sample detection by runtime, falling back to size.

use std::path::Path;

use crate::library::{Media, MediaInfo};

/// Below this size a file without a readable runtime is a sample.
const SAMPLE_SIZE_LIMIT: u64 = 70 * 1024 * 1024;

/// Containers whose runtime can't be trusted, or that aren't real files.
const NEVER_SAMPLE_EXTENSIONS: &[&str] = &["flv", "strm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVerdict {
    Sample,
    NotSample,
}

/// Minimum runtime, in seconds, for a unit expected to last
/// `expected_minutes`.
pub fn minimum_runtime_secs(expected_minutes: u32) -> u32 {
    match expected_minutes {
        0..=3 => 15,
        4..=10 => 90,
        11..=30 => 300,
        _ => 600,
    }
}

pub fn detect_sample(
    path: &Path,
    size: u64,
    media_info: Option<&MediaInfo>,
    media: &Media,
) -> SampleVerdict {
    if media.runtime_minutes == 0 {
        return SampleVerdict::NotSample;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if NEVER_SAMPLE_EXTENSIONS.contains(&extension.as_str()) {
        return SampleVerdict::NotSample;
    }

    match media_info.and_then(|m| m.runtime_seconds) {
        Some(runtime) => {
            if runtime < minimum_runtime_secs(media.runtime_minutes) as f64 {
                SampleVerdict::Sample
            } else {
                SampleVerdict::NotSample
            }
        }
        None if size < SAMPLE_SIZE_LIMIT => SampleVerdict::Sample,
        None => SampleVerdict::NotSample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn media(runtime_minutes: u32) -> Media {
        let mut media = Media::new(1, "Movie", PathBuf::from("/library/Movie"));
        media.runtime_minutes = runtime_minutes;
        media
    }

    fn runtime(seconds: f64) -> MediaInfo {
        MediaInfo {
            runtime_seconds: Some(seconds),
            audio_stream_count: 1,
            ..Default::default()
        }
    }

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_short_runtime_is_sample_regardless_of_size() {
        let verdict = detect_sample(
            Path::new("movie.mkv"),
            20 * GB,
            Some(&runtime(120.0)),
            &media(120),
        );
        assert_eq!(verdict, SampleVerdict::Sample);
    }

    #[test]
    fn test_threshold_classes() {
        assert_eq!(minimum_runtime_secs(2), 15);
        assert_eq!(minimum_runtime_secs(10), 90);
        assert_eq!(minimum_runtime_secs(22), 300);
        assert_eq!(minimum_runtime_secs(45), 600);

        // 100s is enough for a 10 minute short, not for a 22 minute episode.
        let info = runtime(100.0);
        assert_eq!(
            detect_sample(Path::new("a.mkv"), GB, Some(&info), &media(10)),
            SampleVerdict::NotSample
        );
        assert_eq!(
            detect_sample(Path::new("a.mkv"), GB, Some(&info), &media(22)),
            SampleVerdict::Sample
        );
    }

    #[test]
    fn test_size_fallback_without_runtime() {
        assert_eq!(
            detect_sample(Path::new("a.mkv"), 10 * 1024 * 1024, None, &media(120)),
            SampleVerdict::Sample
        );
        assert_eq!(
            detect_sample(Path::new("a.mkv"), GB, None, &media(120)),
            SampleVerdict::NotSample
        );
    }

    #[test]
    fn test_never_sample() {
        let info = runtime(5.0);
        assert_eq!(
            detect_sample(Path::new("a.strm"), 100, Some(&info), &media(120)),
            SampleVerdict::NotSample
        );
        assert_eq!(
            detect_sample(Path::new("a.FLV"), 100, Some(&info), &media(120)),
            SampleVerdict::NotSample
        );
        assert_eq!(
            detect_sample(Path::new("a.mkv"), 100, Some(&info), &media(0)),
            SampleVerdict::NotSample
        );
    }
}
