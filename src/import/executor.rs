//! Moves approved files into the library.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::disk::DiskProvider;
use super::models::{ImportDecision, ImportResult};
use crate::download::DownloadClientItem;
use crate::events::{DomainEvent, EventBus, MediaImportedEvent};
use crate::library::{LibraryStore, Media, MediaFile};

pub struct ImportExecutor {
    library: Arc<dyn LibraryStore>,
    disk: Arc<dyn DiskProvider>,
    events: Arc<EventBus>,
}

impl ImportExecutor {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        disk: Arc<dyn DiskProvider>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            library,
            disk,
            events,
        }
    }

    /// Imports the approved decisions, one file per media unit (largest
    /// first). Returns a result for every decision, rejected ones included.
    pub fn import(
        &self,
        decisions: Vec<ImportDecision>,
        download_item: Option<&DownloadClientItem>,
        client_name: Option<&str>,
    ) -> Vec<ImportResult> {
        let (mut approved, rejected): (Vec<_>, Vec<_>) =
            decisions.into_iter().partition(|d| d.approved());
        approved.sort_by(|a, b| b.local.size.cmp(&a.local.size));

        let mut results = Vec::with_capacity(approved.len() + rejected.len());
        let mut imported_units: HashSet<(i64, Option<u32>)> = HashSet::new();

        for decision in approved {
            let Some(media_id) = decision.local.media.as_ref().map(|m| m.id) else {
                results.push(ImportResult::failed(decision, "Unknown media".to_string()));
                continue;
            };
            if !imported_units.insert((media_id, decision.local.unit)) {
                results.push(ImportResult::skipped(
                    decision,
                    "Media has already been imported",
                ));
                continue;
            }

            match self.import_file(&decision, download_item, client_name) {
                Ok(media_file) => results.push(ImportResult::imported(decision, media_file)),
                Err(e) => {
                    warn!("Couldn't import {}: {:#}", decision.local, e);
                    results.push(ImportResult::failed(
                        decision,
                        format!("Failed to import file: {:#}", e),
                    ));
                }
            }
        }

        results.extend(rejected.into_iter().map(ImportResult::rejected));
        results
    }

    fn import_file(
        &self,
        decision: &ImportDecision,
        download_item: Option<&DownloadClientItem>,
        client_name: Option<&str>,
    ) -> Result<MediaFile> {
        let local = &decision.local;
        let media = local.media.as_ref().context("File has no media")?;

        let existing = self.library.get_media_files(media.id)?;

        // Linking a file already in the library folder replaces nothing.
        let replaced: Vec<MediaFile> = if local.existing_file {
            Vec::new()
        } else {
            existing
                .iter()
                .filter(|f| f.unit == local.unit)
                .cloned()
                .collect()
        };

        let media_file = MediaFile {
            id: 0,
            media_id: media.id,
            relative_path: String::new(),
            size: local.size,
            quality: local.quality,
            media_info: local.media_info.clone(),
            release_group: local.release_group.clone(),
            scene_name: local.scene_name.clone(),
            custom_format_score: local.custom_format_score,
            unit: local.unit,
            date_added: Utc::now(),
        };

        let (destination, media_file) = if local.existing_file {
            let relative = local
                .path
                .strip_prefix(&media.path)
                .with_context(|| format!("{:?} is not inside {:?}", local.path, media.path))?
                .to_string_lossy()
                .to_string();
            if existing.iter().any(|f| f.relative_path == relative) {
                bail!("File is already linked to {}", media.title);
            }
            let mut media_file = MediaFile {
                relative_path: relative,
                ..media_file
            };
            media_file.id = self.library.add_media_file(&media_file)?;
            (local.path.clone(), media_file)
        } else {
            let copy = download_item.map(|i| !i.can_move_files).unwrap_or(false);
            let destination = media.path.join(local.file_name());
            let media_file = MediaFile {
                relative_path: local.file_name(),
                ..media_file
            };
            let media_file = self.transfer_and_record(
                &local.path,
                &destination,
                copy,
                media_file,
                &replaced,
                media,
            )?;
            (destination, media_file)
        };

        for old in &replaced {
            let old_path = old.full_path(media);
            if old_path != destination && self.disk.exists(&old_path) {
                if let Err(e) = self.disk.delete_file(&old_path) {
                    warn!("Couldn't delete replaced file {:?}: {}", old_path, e);
                }
            }
            self.library.delete_media_file(old.id)?;
        }

        self.events
            .publish(DomainEvent::MediaImported(MediaImportedEvent {
                media_id: media.id,
                media_file: media_file.clone(),
                replaced_files: replaced,
                source_path: local.path.clone(),
                imported_path: destination,
                download_client: client_name.map(str::to_string),
                download_id: download_item.map(|i| i.download_id.clone()),
            }));
        Ok(media_file)
    }

    /// Moves or copies `source` into the library and records it.
    ///
    /// Nothing already in the library is touched until the new file is in
    /// place and recorded. A destination held by a file being replaced is
    /// only overwritten after that; until then the new file waits under a
    /// staging name next to it. A failed record puts the source back.
    fn transfer_and_record(
        &self,
        source: &Path,
        destination: &Path,
        copy: bool,
        mut media_file: MediaFile,
        replaced: &[MediaFile],
        media: &Media,
    ) -> Result<MediaFile> {
        self.disk.create_dir_all(&media.path)?;

        let occupied = self.disk.exists(destination);
        if occupied
            && !replaced
                .iter()
                .any(|f| f.full_path(media).as_path() == destination)
        {
            bail!("Destination {:?} already exists", destination);
        }
        let target = if occupied {
            let staging = staging_path(destination);
            // Left over from an interrupted upgrade.
            if self.disk.exists(&staging) {
                self.disk.delete_file(&staging)?;
            }
            staging
        } else {
            destination.to_path_buf()
        };

        if copy {
            self.disk.copy_file(source, &target)?;
        } else {
            self.disk.move_file(source, &target)?;
        }

        match self.library.add_media_file(&media_file) {
            Ok(id) => media_file.id = id,
            Err(e) => {
                self.undo_transfer(source, &target, copy);
                return Err(e.context("Failed to record imported file"));
            }
        }

        if occupied {
            self.disk.delete_file(destination)?;
            self.disk.move_file(&target, destination)?;
        }
        info!(
            "{} {:?} to {:?}",
            if copy { "Copied" } else { "Moved" },
            source,
            destination
        );
        Ok(media_file)
    }

    fn undo_transfer(&self, source: &Path, target: &Path, copied: bool) {
        let undone = if copied {
            self.disk.delete_file(target)
        } else {
            self.disk.move_file(target, source)
        };
        if let Err(e) = undone {
            warn!("Couldn't roll back {:?}: {}", target, e);
        }
    }
}

/// Hidden sibling of `destination` the new file waits in during an upgrade.
fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.importing", name))
}
