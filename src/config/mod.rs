mod file_config;

pub use file_config::{
    CustomFormatConfig, DispatchConfig, FileConfig, ImportConfig, RedownloadConfig,
    WatchFolderClientConfig,
};

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::download::DownloadProtocol;
use crate::qualities::{CustomFormat, CustomFormatScorer, ProperDownloadPolicy};

/// Matches the `--tick-interval-secs` flag default.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub tick_interval_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,

    // Feature configs (with defaults)
    pub import: ImportSettings,
    pub redownload: RedownloadSettings,
    pub dispatch: DispatchSettings,
    pub monitor: MonitorSettings,
    pub clients: Vec<WatchFolderClientSettings>,
    pub custom_formats: Vec<CustomFormatSettings>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let import_file = file.import.unwrap_or_default();
        let defaults = ImportSettings::default();
        let proper_download_policy = match import_file.proper_download_policy {
            Some(s) => ProperDownloadPolicy::from_str(&s)
                .ok_or_else(|| anyhow!("Invalid proper_download_policy: {}", s))?,
            None => defaults.proper_download_policy,
        };
        let import = ImportSettings {
            minimum_free_space_mb: import_file
                .minimum_free_space_mb
                .unwrap_or(defaults.minimum_free_space_mb),
            skip_free_space_check: import_file
                .skip_free_space_check
                .unwrap_or(defaults.skip_free_space_check),
            enable_completed_download_handling: import_file
                .enable_completed_download_handling
                .unwrap_or(defaults.enable_completed_download_handling),
            remove_completed_downloads: import_file
                .remove_completed_downloads
                .unwrap_or(defaults.remove_completed_downloads),
            proper_download_policy,
            disable_media_info: import_file
                .disable_media_info
                .unwrap_or(defaults.disable_media_info),
        };

        let redownload_file = file.redownload.unwrap_or_default();
        let redownload = RedownloadSettings {
            auto_redownload_failed: redownload_file.auto_redownload_failed.unwrap_or(true),
            auto_redownload_failed_from_interactive_search: redownload_file
                .auto_redownload_failed_from_interactive_search
                .unwrap_or(true),
        };

        let dispatch_file = file.dispatch.unwrap_or_default();
        let preferred_protocol = match dispatch_file.preferred_protocol {
            Some(s) => Some(parse_protocol(&s)?),
            None => None,
        };
        let dispatch = DispatchSettings {
            grab_spacing_secs: dispatch_file.grab_spacing_secs.unwrap_or(2),
            prefer_torrent_file: dispatch_file.prefer_torrent_file.unwrap_or(false),
            preferred_protocol,
            fetch_timeout_secs: dispatch_file.fetch_timeout_secs.unwrap_or(30),
        };

        let monitor = MonitorSettings {
            tick_interval_secs: file.tick_interval_secs.unwrap_or(cli.tick_interval_secs),
        };
        if monitor.tick_interval_secs == 0 {
            bail!("tick_interval_secs must be greater than 0");
        }

        let mut clients = Vec::with_capacity(file.clients.len());
        for client in file.clients {
            if clients
                .iter()
                .any(|c: &WatchFolderClientSettings| c.name == client.name)
            {
                bail!("Duplicate download client name: {}", client.name);
            }
            clients.push(WatchFolderClientSettings {
                protocol: parse_protocol(&client.protocol)
                    .with_context(|| format!("Download client {}", client.name))?,
                name: client.name,
                watch_folder: PathBuf::from(client.watch_folder),
                completed_folder: PathBuf::from(client.completed_folder),
                category: client.category,
                settle_secs: client.settle_secs.unwrap_or(30),
            });
        }

        let custom_formats = file
            .custom_formats
            .into_iter()
            .map(|cf| CustomFormatSettings {
                name: cf.name,
                pattern: cf.pattern,
                score: cf.score,
            })
            .collect();

        Ok(Self {
            db_dir,
            import,
            redownload,
            dispatch,
            monitor,
            clients,
            custom_formats,
        })
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.db_dir.join("history.db")
    }

    pub fn library_db_path(&self) -> PathBuf {
        self.db_dir.join("library.db")
    }

    pub fn pending_db_path(&self) -> PathBuf {
        self.db_dir.join("pending.db")
    }

    /// Compiles the configured custom formats. Fails on an invalid pattern.
    pub fn custom_format_scorer(&self) -> Result<CustomFormatScorer> {
        let formats = self
            .custom_formats
            .iter()
            .map(|cf| CustomFormat::new(&cf.name, &cf.pattern, cf.score))
            .collect::<Result<Vec<_>>>()?;
        Ok(CustomFormatScorer::new(formats))
    }
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Space that must remain free on the library volume after an import.
    pub minimum_free_space_mb: u64,
    pub skip_free_space_check: bool,
    pub enable_completed_download_handling: bool,
    pub remove_completed_downloads: bool,
    pub proper_download_policy: ProperDownloadPolicy,
    pub disable_media_info: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            minimum_free_space_mb: 100,
            skip_free_space_check: false,
            enable_completed_download_handling: true,
            remove_completed_downloads: true,
            proper_download_policy: ProperDownloadPolicy::PreferAndUpgrade,
            disable_media_info: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedownloadSettings {
    pub auto_redownload_failed: bool,
    pub auto_redownload_failed_from_interactive_search: bool,
}

impl Default for RedownloadSettings {
    fn default() -> Self {
        Self {
            auto_redownload_failed: true,
            auto_redownload_failed_from_interactive_search: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub grab_spacing_secs: u64,
    pub prefer_torrent_file: bool,
    pub preferred_protocol: Option<DownloadProtocol>,
    pub fetch_timeout_secs: u64,
}

impl DispatchSettings {
    pub fn grab_spacing(&self) -> Duration {
        Duration::from_secs(self.grab_spacing_secs)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub tick_interval_secs: u64,
}

impl MonitorSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchFolderClientSettings {
    pub name: String,
    pub protocol: DownloadProtocol,
    pub watch_folder: PathBuf,
    pub completed_folder: PathBuf,
    pub category: Option<String>,
    pub settle_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomFormatSettings {
    pub name: String,
    pub pattern: String,
    pub score: i32,
}

fn parse_protocol(s: &str) -> Result<DownloadProtocol> {
    DownloadProtocol::from_str(s).ok_or_else(|| anyhow!("Unknown download protocol: {}", s))
}
