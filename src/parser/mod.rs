//! Release and file name parsing.

mod quality;
mod scene;
mod title;

pub use quality::{parse_quality, parse_revision, quality_from_height};
pub use scene::{
    is_scene_title, is_video_file, remove_file_extension, safe_file_name,
    strip_trailing_extensions, VIDEO_EXTENSIONS,
};
pub use title::{clean_title, parse_release_group, parse_title, ParsedMediaInfo};
