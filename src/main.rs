use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_acquisition::import::{
    ffprobe_available, FfprobeMediaInfoReader, MediaInfoReader, NoMediaInfoReader,
};
use pezzottify_acquisition::config::DEFAULT_TICK_INTERVAL_SECS;
use pezzottify_acquisition::{Acquisition, AppConfig, ChannelSearchQueue, CliConfig, FileConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path = PathBuf::from(s);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding history.db, library.db and pending.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Seconds between download monitor passes.
    #[clap(long, default_value_t = DEFAULT_TICK_INTERVAL_SECS)]
    pub tick_interval_secs: u64,

    /// Run a single monitor pass and exit.
    #[clap(long)]
    pub once: bool,
}

async fn media_info_reader(disabled: bool) -> Arc<dyn MediaInfoReader> {
    if disabled {
        info!("Media info probing disabled by config");
        return Arc::new(NoMediaInfoReader);
    }
    if ffprobe_available().await {
        Arc::new(FfprobeMediaInfoReader)
    } else {
        warn!("ffprobe not found, sample detection falls back to file size");
        Arc::new(NoMediaInfoReader)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(
        "Starting acquisition-server (git {})",
        env!("ACQUISITION_GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        tick_interval_secs: cli_args.tick_interval_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;
    if config.clients.is_empty() {
        warn!("No download clients configured, nothing will be tracked");
    }

    let media_info = media_info_reader(config.import.disable_media_info).await;

    let (search_queue, mut search_rx) = ChannelSearchQueue::new();
    tokio::spawn(async move {
        while let Some(command) = search_rx.recv().await {
            info!("Search requested: {}", command);
        }
    });

    let app = Acquisition::build(config, media_info, Arc::new(search_queue))?;

    if cli_args.once {
        app.monitor.tick().await;
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let monitor = app.monitor.clone();
    let monitor_shutdown = shutdown.clone();
    let monitor_handle = tokio::spawn(async move { monitor.run(monitor_shutdown).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C, shutting down...");
    shutdown.cancel();

    monitor_handle
        .await
        .context("Download monitor task panicked")?;
    info!("Shutdown complete");
    Ok(())
}
