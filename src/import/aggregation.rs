//! Fills in the derived fields of a [`LocalMediaFile`] from its file, folder
//! and download-job names plus media info.

use super::models::LocalMediaFile;
use crate::parser::{is_scene_title, parse_quality, quality_from_height, strip_trailing_extensions};
use crate::qualities::{CustomFormatScorer, Quality, QualityModel, QualitySource};

/// Facts about the whole candidate set a single file can't know.
#[derive(Debug, Clone, Copy)]
pub struct AggregationContext<'a> {
    /// Title the download client reported for the job.
    pub download_title: Option<&'a str>,
    /// Name of the folder being imported, if any.
    pub folder_name: Option<&'a str>,
    pub video_file_count: usize,
    /// Non-video files that aren't sidecars of the video (subtitles, nfo).
    pub has_extras: bool,
    pub scorer: &'a CustomFormatScorer,
}

pub fn aggregate(local: &mut LocalMediaFile, ctx: &AggregationContext<'_>) {
    local.quality = aggregate_quality(local);
    local.scene_name = aggregate_scene_name(local, ctx);
    local.release_group = local
        .parsed_info
        .as_ref()
        .and_then(|i| i.release_group.clone())
        .or_else(|| local.folder_info.as_ref().and_then(|i| i.release_group.clone()))
        .or_else(|| local.download_info.as_ref().and_then(|i| i.release_group.clone()));
    local.unit = local
        .parsed_info
        .as_ref()
        .and_then(|i| i.unit)
        .or_else(|| local.folder_info.as_ref().and_then(|i| i.unit));

    let scored_title = local
        .scene_name
        .clone()
        .unwrap_or_else(|| local.file_name());
    local.custom_format_score = ctx.scorer.score(&scored_title);
}

/// File quality wins unless it only came from the extension, or the folder
/// names a strictly better one. Media info is used only when names say
/// nothing.
pub fn aggregate_quality(local: &LocalMediaFile) -> QualityModel {
    let file = local
        .parsed_info
        .as_ref()
        .map(|i| i.quality)
        .unwrap_or_else(|| parse_quality(&local.file_name()));
    let folder = local.folder_info.as_ref().map(|i| i.quality);
    let download = local.download_info.as_ref().map(|i| i.quality);

    let known = |q: &&QualityModel| q.quality != Quality::Unknown;
    let weak_file = file.source == QualitySource::Extension || file.quality == Quality::Unknown;

    let mut quality = match folder.as_ref().filter(known) {
        Some(folder) if weak_file || folder.quality > file.quality => *folder,
        _ if weak_file => download.filter(|q| known(&q)).unwrap_or(file),
        _ => file,
    };

    if quality.quality == Quality::Unknown {
        let height = local.media_info.as_ref().and_then(|m| m.height);
        if let Some(from_height) = height.and_then(|h| quality_from_height(h, Quality::Unknown)) {
            quality = QualityModel::new(from_height)
                .with_revision(quality.revision)
                .with_source(QualitySource::MediaInfo);
        }
    }
    quality
}

/// The job title is only trusted when the job is a single video with nothing
/// unrelated beside it. Otherwise a scene-style file or folder name is used.
pub fn aggregate_scene_name(local: &LocalMediaFile, ctx: &AggregationContext<'_>) -> Option<String> {
    if let Some(title) = ctx.download_title {
        if ctx.video_file_count == 1 && !ctx.has_extras {
            let title = strip_trailing_extensions(title);
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }

    let file_name = local.file_name();
    if is_scene_title(&file_name) {
        return Some(strip_trailing_extensions(&file_name).to_string());
    }

    match ctx.folder_name {
        Some(folder) if local.folder_info.is_some() && is_scene_title(folder) => {
            Some(strip_trailing_extensions(folder).to_string())
        }
        _ => None,
    }
}
