//! Wiring of stores, clients and services from an [`AppConfig`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::download::tracked::{
    CompletedDownloadService, DownloadMonitor, FailedDownloadService, TrackedDownloadService,
    TrackedDownloadStore,
};
use crate::download::{
    DownloadClient, DownloadClientProvider, DownloadService, HttpFetcher, IndexerStatusService,
    PendingReleaseStore, ReleaseDispatcher, WatchFolderClient,
};
use crate::events::EventBus;
use crate::history::{HistoryRecorder, SqliteHistoryStore};
use crate::import::{
    DiskProvider, DownloadedMediaImportService, ImportDecisionMaker, ImportExecutor,
    LocalDiskProvider, MediaInfoReader,
};
use crate::library::SqliteLibraryStore;
use crate::redownload::{RedownloadFailedDownloadService, SearchQueue};

/// Everything the server runs, built once at startup.
pub struct Acquisition {
    pub config: AppConfig,
    pub events: Arc<EventBus>,
    pub history: Arc<SqliteHistoryStore>,
    pub library: Arc<SqliteLibraryStore>,
    pub pending: Arc<PendingReleaseStore>,
    pub indexer_status: Arc<IndexerStatusService>,
    pub dispatcher: Arc<ReleaseDispatcher>,
    pub decision_maker: Arc<ImportDecisionMaker>,
    pub importer: Arc<DownloadedMediaImportService>,
    pub tracked: Arc<TrackedDownloadService>,
    pub failed: Arc<FailedDownloadService>,
    pub completed: Arc<CompletedDownloadService>,
    pub monitor: Arc<DownloadMonitor>,
}

impl Acquisition {
    pub fn build(
        config: AppConfig,
        media_info: Arc<dyn MediaInfoReader>,
        search_queue: Arc<dyn SearchQueue>,
    ) -> Result<Self> {
        info!("Opening history database at {:?}...", config.history_db_path());
        let history = Arc::new(SqliteHistoryStore::new(config.history_db_path())?);
        info!("Opening library database at {:?}...", config.library_db_path());
        let library = Arc::new(SqliteLibraryStore::new(config.library_db_path())?);
        info!("Opening pending release database at {:?}...", config.pending_db_path());
        let pending = Arc::new(PendingReleaseStore::new(config.pending_db_path())?);

        // Handlers run in registration order: history first, so later
        // handlers can rely on it.
        let events = Arc::new(EventBus::new());
        events.register(Arc::new(HistoryRecorder::new(history.clone())));
        events.register(pending.clone());
        events.register(Arc::new(RedownloadFailedDownloadService::new(
            library.clone(),
            search_queue,
            config.redownload.clone(),
        )));

        let fetcher = Arc::new(
            HttpFetcher::new(std::time::Duration::from_secs(
                config.dispatch.fetch_timeout_secs,
            ))
            .context("Failed to create HTTP client")?,
        );
        let clients: Vec<Arc<dyn DownloadClient>> = config
            .clients
            .iter()
            .map(|settings| {
                info!(
                    "Download client {} ({}): watching {:?}, completed in {:?}",
                    settings.name, settings.protocol, settings.watch_folder, settings.completed_folder
                );
                Arc::new(WatchFolderClient::new(
                    settings,
                    fetcher.clone(),
                    config.dispatch.prefer_torrent_file,
                )) as Arc<dyn DownloadClient>
            })
            .collect();
        let clients = DownloadClientProvider::new(clients);

        let indexer_status = Arc::new(IndexerStatusService::new());
        let download_service = Arc::new(
            DownloadService::new(clients.clone(), indexer_status.clone(), events.clone())
                .with_grab_spacing(config.dispatch.grab_spacing()),
        );
        let dispatcher = Arc::new(
            ReleaseDispatcher::new(download_service, pending.clone())
                .with_preferred_protocol(config.dispatch.preferred_protocol),
        );

        let disk: Arc<dyn DiskProvider> = Arc::new(LocalDiskProvider::new());
        let decision_maker = Arc::new(
            ImportDecisionMaker::new(
                history.clone(),
                library.clone(),
                disk.clone(),
                media_info,
                config.import.clone(),
            )
            .with_scorer(Arc::new(config.custom_format_scorer()?)),
        );
        let executor = Arc::new(ImportExecutor::new(
            library.clone(),
            disk.clone(),
            events.clone(),
        ));
        let importer = Arc::new(DownloadedMediaImportService::new(
            decision_maker.clone(),
            executor,
            disk,
        ));

        let store = Arc::new(TrackedDownloadStore::new());
        let tracked = Arc::new(TrackedDownloadService::new(
            store.clone(),
            history.clone(),
            library.clone(),
        ));
        let failed = Arc::new(FailedDownloadService::new(
            store.clone(),
            history.clone(),
            events.clone(),
        ));
        let completed = Arc::new(CompletedDownloadService::new(
            store,
            history.clone(),
            library.clone(),
            importer.clone(),
            events.clone(),
        ));
        let monitor = Arc::new(
            DownloadMonitor::new(
                clients,
                tracked.clone(),
                failed.clone(),
                completed.clone(),
                events.clone(),
                config.import.clone(),
            )
            .with_tick_interval(config.monitor.tick_interval()),
        );

        Ok(Self {
            config,
            events,
            history,
            library,
            pending,
            indexer_status,
            dispatcher,
            decision_maker,
            importer,
            tracked,
            failed,
            completed,
            monitor,
        })
    }
}
