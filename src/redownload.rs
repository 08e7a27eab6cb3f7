//! Re-search after a failed download.
//!
//! The search is scoped to the media that failed, or to their whole
//! collection when every member of it failed together.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::RedownloadSettings;
use crate::download::ReleaseSource;
use crate::events::{DomainEvent, DownloadFailedEvent, EventHandler};
use crate::history::data_keys;
use crate::library::LibraryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCommand {
    MediaSearch { media_ids: Vec<i64> },
    CollectionSearch { collection_id: i64 },
}

impl fmt::Display for SearchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchCommand::MediaSearch { media_ids } => {
                write!(f, "media search for {:?}", media_ids)
            }
            SearchCommand::CollectionSearch { collection_id } => {
                write!(f, "collection search for {}", collection_id)
            }
        }
    }
}

/// Receives search commands; searching itself happens elsewhere.
pub trait SearchQueue: Send + Sync {
    fn push(&self, command: SearchCommand) -> Result<()>;
}

pub struct ChannelSearchQueue {
    tx: mpsc::UnboundedSender<SearchCommand>,
}

impl ChannelSearchQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SearchCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SearchQueue for ChannelSearchQueue {
    fn push(&self, command: SearchCommand) -> Result<()> {
        self.tx
            .send(command)
            .ok()
            .context("Search queue receiver is gone")
    }
}

pub struct RedownloadFailedDownloadService {
    library: Arc<dyn LibraryStore>,
    queue: Arc<dyn SearchQueue>,
    settings: RedownloadSettings,
}

impl RedownloadFailedDownloadService {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        queue: Arc<dyn SearchQueue>,
        settings: RedownloadSettings,
    ) -> Self {
        Self {
            library,
            queue,
            settings,
        }
    }

    fn on_failed(&self, failed: &DownloadFailedEvent) -> Result<()> {
        if failed.skip_redownload {
            debug!("Skip redownload requested for '{}'", failed.source_title);
            return Ok(());
        }
        if !self.settings.auto_redownload_failed {
            debug!("Auto redownload is disabled");
            return Ok(());
        }

        let release_source = failed
            .data
            .get(data_keys::RELEASE_SOURCE)
            .map(|s| ReleaseSource::from_str(s))
            .unwrap_or_default();
        if release_source == ReleaseSource::InteractiveSearch
            && !self.settings.auto_redownload_failed_from_interactive_search
        {
            debug!(
                "Auto redownload of interactive search grabs is disabled, skipping '{}'",
                failed.source_title
            );
            return Ok(());
        }

        let Some(command) = self.search_command(&failed.media_ids)? else {
            return Ok(());
        };
        info!("Queueing {} after failed '{}'", command, failed.source_title);
        self.queue.push(command)
    }

    fn search_command(&self, media_ids: &[i64]) -> Result<Option<SearchCommand>> {
        let failed: BTreeSet<i64> = media_ids.iter().copied().collect();
        if failed.is_empty() {
            return Ok(None);
        }
        if failed.len() == 1 {
            return Ok(Some(SearchCommand::MediaSearch {
                media_ids: failed.into_iter().collect(),
            }));
        }

        let media = self
            .library
            .get_media_many(&failed.iter().copied().collect::<Vec<_>>())?;
        let collections: Vec<Option<i64>> = media
            .iter()
            .map(|m| m.collection_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if let [Some(collection_id)] = collections.as_slice() {
            let collection_id = *collection_id;
            let members = self.library.find_media_by_collection(collection_id)?;
            if !members.is_empty() && members.iter().all(|m| failed.contains(&m.id)) {
                return Ok(Some(SearchCommand::CollectionSearch { collection_id }));
            }
        }

        Ok(Some(SearchCommand::MediaSearch {
            media_ids: failed.into_iter().collect(),
        }))
    }
}

impl EventHandler for RedownloadFailedDownloadService {
    fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::DownloadFailed(failed) = event {
            if let Err(e) = self.on_failed(failed) {
                error!("Couldn't queue redownload for '{}': {:#}", failed.source_title, e);
            }
        }
    }
}
