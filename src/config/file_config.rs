use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub tick_interval_secs: Option<u64>,

    // Feature configs
    pub import: Option<ImportConfig>,
    pub redownload: Option<RedownloadConfig>,
    pub dispatch: Option<DispatchConfig>,
    pub clients: Vec<WatchFolderClientConfig>,
    pub custom_formats: Vec<CustomFormatConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ImportConfig {
    pub minimum_free_space_mb: Option<u64>,
    pub skip_free_space_check: Option<bool>,
    pub enable_completed_download_handling: Option<bool>,
    pub remove_completed_downloads: Option<bool>,
    /// "prefer_and_upgrade", "do_not_upgrade" or "do_not_prefer"
    pub proper_download_policy: Option<String>,
    /// Skip ffprobe even when it is installed.
    pub disable_media_info: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RedownloadConfig {
    pub auto_redownload_failed: Option<bool>,
    pub auto_redownload_failed_from_interactive_search: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    pub grab_spacing_secs: Option<u64>,
    pub prefer_torrent_file: Option<bool>,
    /// "torrent", "usenet" or "direct_connect"
    pub preferred_protocol: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchFolderClientConfig {
    pub name: String,
    pub protocol: String,
    pub watch_folder: String,
    pub completed_folder: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Seconds a completed entry must stay unmodified before it is reported.
    #[serde(default)]
    pub settle_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CustomFormatConfig {
    pub name: String,
    pub pattern: String,
    pub score: i32,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            db_dir = "/data"
            tick_interval_secs = 30

            [import]
            minimum_free_space_mb = 500
            proper_download_policy = "do_not_upgrade"

            [redownload]
            auto_redownload_failed = false

            [dispatch]
            prefer_torrent_file = true
            preferred_protocol = "usenet"

            [[clients]]
            name = "nzb-blackhole"
            protocol = "usenet"
            watch_folder = "/downloads/watch"
            completed_folder = "/downloads/complete"

            [[custom_formats]]
            name = "x265"
            pattern = "(?i)x265|hevc"
            score = 50
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.db_dir.as_deref(), Some("/data"));
        assert_eq!(config.tick_interval_secs, Some(30));
        let import = config.import.unwrap();
        assert_eq!(import.minimum_free_space_mb, Some(500));
        assert_eq!(import.skip_free_space_check, None);
        assert_eq!(config.redownload.unwrap().auto_redownload_failed, Some(false));
        assert_eq!(config.dispatch.unwrap().prefer_torrent_file, Some(true));
        assert_eq!(config.clients.len(), 1);
        assert_eq!(config.clients[0].category, None);
        assert_eq!(config.custom_formats[0].score, 50);
    }

    #[test]
    fn test_empty_config() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.db_dir.is_none());
        assert!(config.clients.is_empty());
    }
}
