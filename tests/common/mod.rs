//! Common test infrastructure
//!
//! Builds a full [`Acquisition`] over temp-dir databases and a single
//! torrent watch-folder client, plus helpers playing the external
//! downloader's part.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pezzottify_acquisition::download::{DownloadDecision, DownloadProtocol, ReleaseInfo, RemoteMedia};
use pezzottify_acquisition::import::NoMediaInfoReader;
use pezzottify_acquisition::library::{LibraryStore, Media};
use pezzottify_acquisition::qualities::{Quality, QualityModel};
use pezzottify_acquisition::{
    Acquisition, AppConfig, ChannelSearchQueue, CliConfig, FileConfig, SearchCommand,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const RELEASE_TITLE: &str = "Movie.Title.2020.1080p.WEB-DL-GRP";
pub const INFO_HASH: &str = "0123456789ABCDEF0123456789ABCDEF01234567";

pub struct TestAcquisition {
    pub dir: TempDir,
    pub app: Acquisition,
    pub searches: UnboundedReceiver<SearchCommand>,
    pub media: Media,
}

impl TestAcquisition {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_dir = dir.path().join("db");
        std::fs::create_dir_all(&db_dir).unwrap();

        let config_path = dir.path().join("acquisition.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
db_dir = "{db}"

[import]
skip_free_space_check = true
disable_media_info = true

[dispatch]
grab_spacing_secs = 0

[[clients]]
name = "blackhole"
protocol = "torrent"
watch_folder = "{watch}"
completed_folder = "{completed}"
settle_secs = 0
"#,
                db = db_dir.display(),
                watch = dir.path().join("watch").display(),
                completed = dir.path().join("completed").display(),
            ),
        )
        .unwrap();

        let file_config = FileConfig::load(&config_path).unwrap();
        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config)).unwrap();
        let (queue, searches) = ChannelSearchQueue::new();
        let app = Acquisition::build(config, Arc::new(NoMediaInfoReader), Arc::new(queue)).unwrap();

        let mut media = Media::new(0, "Movie Title", dir.path().join("library/Movie Title"));
        media.year = Some(2020);
        media.runtime_minutes = 120;
        media.id = app.library.add_media(&media).unwrap();

        Self {
            dir,
            app,
            searches,
            media,
        }
    }

    pub fn watch_folder(&self) -> PathBuf {
        self.dir.path().join("watch")
    }

    pub fn completed_folder(&self) -> PathBuf {
        self.dir.path().join("completed")
    }

    pub fn decision(&self) -> DownloadDecision {
        let mut release = ReleaseInfo::new(RELEASE_TITLE, DownloadProtocol::Torrent);
        release.indexer = "indexer".to_string();
        release.indexer_id = 1;
        release.magnet_url = Some(format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            INFO_HASH, RELEASE_TITLE
        ));
        DownloadDecision::new(RemoteMedia {
            release,
            parsed_info: None,
            media: vec![self.media.clone()],
            quality: QualityModel::new(Quality::WebDl1080p),
            custom_format_score: 0,
        })
    }

    /// Plays the downloader: a finished job folder holding one video.
    pub fn complete_download(&self, video_size: u64) -> PathBuf {
        let folder = self.completed_folder().join(RELEASE_TITLE);
        write_file(&folder.join(format!("{}.mkv", RELEASE_TITLE)), video_size);
        folder
    }
}

pub fn write_file(path: &Path, size: u64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size).unwrap();
}
