//! Stream details of candidate files via ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::library::MediaInfo;

#[derive(Debug, Error)]
pub enum MediaInfoError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait MediaInfoReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<MediaInfo, MediaInfoError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    height: Option<u32>,
}

impl FfprobeOutput {
    fn into_media_info(self) -> MediaInfo {
        let video = self.streams.iter().find(|s| s.codec_type == "video");
        let audio: Vec<&FfprobeStream> = self
            .streams
            .iter()
            .filter(|s| s.codec_type == "audio")
            .collect();

        MediaInfo {
            runtime_seconds: self
                .format
                .duration
                .as_ref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| *d > 0.0),
            video_codec: video.and_then(|v| v.codec_name.clone()),
            height: video.and_then(|v| v.height),
            audio_stream_count: audio.len() as u32,
            audio_codec: audio.first().and_then(|a| a.codec_name.clone()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FfprobeMediaInfoReader;

#[async_trait]
impl MediaInfoReader for FfprobeMediaInfoReader {
    async fn read(&self, path: &Path) -> Result<MediaInfo, MediaInfoError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaInfoError::ProbeFailed(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let probe: FfprobeOutput = serde_json::from_str(&stdout)
            .map_err(|e| MediaInfoError::InvalidOutput(format!("JSON parse error: {}", e)))?;

        let info = probe.into_media_info();
        debug!("Media info for {:?}: {:?}", path, info);
        Ok(info)
    }
}

/// Used when ffprobe isn't available: every read fails, so callers fall
/// back to name- and size-based checks.
#[derive(Debug, Default, Clone)]
pub struct NoMediaInfoReader;

#[async_trait]
impl MediaInfoReader for NoMediaInfoReader {
    async fn read(&self, _path: &Path) -> Result<MediaInfo, MediaInfoError> {
        Err(MediaInfoError::ProbeFailed("media info disabled".to_string()))
    }
}

/// Whether ffprobe can be run.
pub async fn ffprobe_available() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffprobe_json_mapping() {
        let json = r#"{
            "format": {"duration": "5423.120000", "format_name": "matroska,webm"},
            "streams": [
                {"codec_type": "video", "codec_name": "hevc", "height": 2160},
                {"codec_type": "audio", "codec_name": "eac3"},
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "subtitle", "codec_name": "subrip"}
            ]
        }"#;
        let info = serde_json::from_str::<FfprobeOutput>(json)
            .unwrap()
            .into_media_info();

        assert_eq!(info.runtime_seconds, Some(5423.12));
        assert_eq!(info.video_codec.as_deref(), Some("hevc"));
        assert_eq!(info.height, Some(2160));
        assert_eq!(info.audio_stream_count, 2);
        assert_eq!(info.audio_codec.as_deref(), Some("eac3"));
    }

    #[test]
    fn test_missing_duration() {
        let json = r#"{"format": {}, "streams": []}"#;
        let info = serde_json::from_str::<FfprobeOutput>(json)
            .unwrap()
            .into_media_info();
        assert_eq!(info.runtime_seconds, None);
        assert_eq!(info.audio_stream_count, 0);
    }
}
