//! Deferred releases: temporarily rejected or waiting for a download client.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use super::models::{DownloadDecision, ReleaseInfo, RemoteMedia};
use crate::events::{DomainEvent, EventHandler, GrabbedEvent};
use crate::qualities::QualityModel;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_in_memory, open_versioned, Column, SqlType, Table, VersionedSchema,
};

// =============================================================================
// Schema
// =============================================================================

const PENDING_RELEASES_TABLE_V0: Table = Table {
    name: "pending_releases",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("indexer", &SqlType::Text, non_null = true),
        sqlite_column!("publish_date", &SqlType::Integer, non_null = true),
        sqlite_column!("release", &SqlType::Text, non_null = true),
        sqlite_column!("media_ids", &SqlType::Text, non_null = true),
        sqlite_column!("quality", &SqlType::Text, non_null = true),
        sqlite_column!("custom_format_score", &SqlType::Integer, non_null = true),
        sqlite_column!("reason", &SqlType::Text, non_null = true),
        sqlite_column!("added", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_pending_identity", "title, publish_date, indexer")],
};

pub const PENDING_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[PENDING_RELEASES_TABLE_V0],
    migration: None,
}];

// =============================================================================
// Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReleaseReason {
    /// Temporarily rejected (delay profile, not yet old enough, ...).
    Delay,
    /// No client configured for the protocol at grab time.
    DownloadClientUnavailable,
    /// Kept in reserve behind a release grabbed or deferred for the same media.
    Fallback,
}

impl PendingReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingReleaseReason::Delay => "Delay",
            PendingReleaseReason::DownloadClientUnavailable => "DownloadClientUnavailable",
            PendingReleaseReason::Fallback => "Fallback",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "DownloadClientUnavailable" => PendingReleaseReason::DownloadClientUnavailable,
            "Fallback" => PendingReleaseReason::Fallback,
            _ => PendingReleaseReason::Delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRelease {
    pub id: i64,
    pub media_ids: Vec<i64>,
    pub title: String,
    pub release: ReleaseInfo,
    pub quality: QualityModel,
    pub custom_format_score: i32,
    pub reason: PendingReleaseReason,
    pub added: DateTime<Utc>,
}

struct PendingRow {
    id: i64,
    title: String,
    release: String,
    media_ids: String,
    quality: String,
    custom_format_score: i32,
    reason: String,
    added: i64,
}

impl PendingRow {
    fn into_pending(self) -> serde_json::Result<PendingRelease> {
        Ok(PendingRelease {
            id: self.id,
            media_ids: serde_json::from_str(&self.media_ids)?,
            title: self.title,
            release: serde_json::from_str(&self.release)?,
            quality: QualityModel::from_json(&self.quality).unwrap_or_default(),
            custom_format_score: self.custom_format_score,
            reason: PendingReleaseReason::from_db_str(&self.reason),
            added: Utc.timestamp_opt(self.added, 0).single().unwrap_or_default(),
        })
    }
}

// =============================================================================
// Store
// =============================================================================

pub struct PendingReleaseStore {
    conn: Arc<Mutex<Connection>>,
}

impl PendingReleaseStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, PENDING_VERSIONED_SCHEMAS, "pending")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(open_in_memory(PENDING_VERSIONED_SCHEMAS)?)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("pending connection mutex poisoned"))
    }

    fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingRow> {
        Ok(PendingRow {
            id: row.get("id")?,
            title: row.get("title")?,
            release: row.get("release")?,
            media_ids: row.get("media_ids")?,
            quality: row.get("quality")?,
            custom_format_score: row.get("custom_format_score")?,
            reason: row.get("reason")?,
            added: row.get("added")?,
        })
    }

    /// Adds a deferred release. Returns `None` when the same release (title,
    /// publish date and indexer) is already pending.
    pub fn add(&self, remote: &RemoteMedia, reason: PendingReleaseReason) -> Result<Option<i64>> {
        let release = &remote.release;
        let release_json =
            serde_json::to_string(release).context("Failed to encode pending release")?;
        let media_ids = serde_json::to_string(&remote.media_ids())?;

        let conn = self.conn()?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_releases WHERE title = ?1 AND publish_date = ?2 AND indexer = ?3",
            params![release.title, release.publish_date.timestamp(), release.indexer],
            |row| row.get(0),
        )?;
        if existing > 0 {
            debug!("'{}' is already pending", release.title);
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO pending_releases (title, indexer, publish_date, release, media_ids, quality, custom_format_score, reason, added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                release.title,
                release.indexer,
                release.publish_date.timestamp(),
                release_json,
                media_ids,
                remote.quality.to_json(),
                remote.custom_format_score,
                reason.as_str(),
                Utc::now().timestamp(),
            ],
        )?;
        info!("Added '{}' to pending releases ({})", release.title, reason.as_str());
        Ok(Some(conn.last_insert_rowid()))
    }

    pub fn get_all(&self) -> Result<Vec<PendingRelease>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM pending_releases ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::row_to_pending)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_pending() {
                Ok(item) => pending.push(item),
                Err(e) => error!("Skipping unreadable pending release {}: {}", id, e),
            }
        }
        Ok(pending)
    }

    /// Pending releases whose indexer is not currently blocked.
    pub fn get_pending(&self, blocked_indexers: &HashSet<i64>) -> Result<Vec<PendingRelease>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|p| !blocked_indexers.contains(&p.release.indexer_id))
            .collect())
    }

    pub fn remove(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM pending_releases WHERE id = ?1", params![id])? > 0)
    }

    /// Drops pending copies of releases that have since been permanently rejected.
    pub fn remove_rejected(&self, decisions: &[DownloadDecision]) -> Result<usize> {
        let rejected: Vec<&ReleaseInfo> = decisions
            .iter()
            .filter(|d| d.rejected())
            .map(|d| &d.remote.release)
            .collect();
        if rejected.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for pending in self.get_all()? {
            let matches = rejected.iter().any(|r| {
                r.title == pending.release.title
                    && r.indexer == pending.release.indexer
                    && r.publish_date.timestamp() == pending.release.publish_date.timestamp()
            });
            if matches && self.remove(pending.id)? {
                debug!("Removed rejected release '{}' from pending", pending.title);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// After a grab, pending releases for the same media that would not be
    /// an improvement are dropped.
    pub fn remove_grabbed(&self, grabbed: &GrabbedEvent) -> Result<usize> {
        let grabbed_ids: HashSet<i64> = grabbed.remote.media_ids().into_iter().collect();
        let grabbed_quality = &grabbed.remote.quality;

        let mut removed = 0;
        for pending in self.get_all()? {
            let overlaps = pending.media_ids.iter().any(|id| grabbed_ids.contains(id));
            let not_better = (pending.quality.quality, pending.quality.revision)
                <= (grabbed_quality.quality, grabbed_quality.revision);
            if overlaps && not_better && self.remove(pending.id)? {
                debug!(
                    "Removed '{}' from pending after grabbing '{}'",
                    pending.title, grabbed.remote.release.title
                );
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl EventHandler for PendingReleaseStore {
    fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::Grabbed(grabbed) = event {
            if let Err(e) = self.remove_grabbed(grabbed) {
                error!("Failed to clean pending releases after grab: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::{DownloadProtocol, RejectionType};
    use crate::library::Media;
    use crate::qualities::Quality;
    use std::path::PathBuf;

    fn remote(title: &str, media_id: i64, quality: Quality, indexer_id: i64) -> RemoteMedia {
        let mut release = ReleaseInfo::new(title, DownloadProtocol::Torrent);
        release.indexer = format!("indexer-{}", indexer_id);
        release.indexer_id = indexer_id;
        RemoteMedia {
            release,
            parsed_info: None,
            media: vec![Media::new(media_id, "Movie", PathBuf::from("/library/Movie"))],
            quality: QualityModel::new(quality),
            custom_format_score: 0,
        }
    }

    #[test]
    fn test_add_dedupes_and_roundtrips() {
        let store = PendingReleaseStore::in_memory().unwrap();
        let r = remote("Movie.2020.720p.HDTV-GRP", 1, Quality::Hdtv720p, 1);

        assert!(store.add(&r, PendingReleaseReason::Delay).unwrap().is_some());
        assert!(store.add(&r, PendingReleaseReason::Delay).unwrap().is_none());

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].release.title, "Movie.2020.720p.HDTV-GRP");
        assert_eq!(all[0].release.protocol, DownloadProtocol::Torrent);
        assert_eq!(all[0].media_ids, vec![1]);
        assert_eq!(all[0].quality.quality, Quality::Hdtv720p);
        assert_eq!(all[0].reason, PendingReleaseReason::Delay);
    }

    #[test]
    fn test_blocked_indexers_are_filtered() {
        let store = PendingReleaseStore::in_memory().unwrap();
        store
            .add(&remote("A", 1, Quality::Hdtv720p, 1), PendingReleaseReason::Delay)
            .unwrap();
        store
            .add(&remote("B", 2, Quality::Hdtv720p, 2), PendingReleaseReason::Delay)
            .unwrap();

        let blocked: HashSet<i64> = [2].into_iter().collect();
        let pending = store.get_pending(&blocked).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "A");
    }

    #[test]
    fn test_grab_removes_lower_quality_pending() {
        let store = PendingReleaseStore::in_memory().unwrap();
        store
            .add(&remote("Low", 1, Quality::Hdtv720p, 1), PendingReleaseReason::Delay)
            .unwrap();
        store
            .add(&remote("High", 1, Quality::Bluray2160p, 1), PendingReleaseReason::Delay)
            .unwrap();
        store
            .add(&remote("Other", 2, Quality::Hdtv720p, 1), PendingReleaseReason::Delay)
            .unwrap();

        store.handle(&DomainEvent::Grabbed(GrabbedEvent {
            remote: remote("Grabbed", 1, Quality::Bluray1080p, 1),
            download_client: "c".to_string(),
            download_client_name: "c".to_string(),
            download_id: Some("x".to_string()),
        }));

        let titles: Vec<String> = store.get_all().unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["High", "Other"]);
    }

    #[test]
    fn test_remove_rejected() {
        let store = PendingReleaseStore::in_memory().unwrap();
        let r = remote("Movie", 1, Quality::Hdtv720p, 1);
        store.add(&r, PendingReleaseReason::Delay).unwrap();

        let decision = DownloadDecision::new(r).with_rejection("Blocklisted", RejectionType::Permanent);
        assert_eq!(store.remove_rejected(&[decision]).unwrap(), 1);
        assert!(store.get_all().unwrap().is_empty());
    }
}
