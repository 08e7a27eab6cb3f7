//! SQLite-backed history storage.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::models::{HistoryEvent, HistoryEventType};
use super::schema::HISTORY_VERSIONED_SCHEMAS;
use crate::qualities::QualityModel;
use crate::sqlite_persistence::{open_in_memory, open_versioned};

/// Append-only history log.
///
/// Every "current state" fact (already imported, grabbed quality, failure
/// cause) is derived from these queries rather than stored separately.
pub trait HistoryStore: Send + Sync {
    /// Append an event, returning its id.
    fn append(&self, event: &HistoryEvent) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<HistoryEvent>>;

    /// All events for a download id, most recent first.
    fn find_by_download_id(&self, download_id: &str) -> Result<Vec<HistoryEvent>>;

    /// All events for a media entity, most recent first.
    fn find_by_media_id(&self, media_id: i64) -> Result<Vec<HistoryEvent>>;

    fn most_recent_for_download_id(&self, download_id: &str) -> Result<Option<HistoryEvent>> {
        Ok(self.find_by_download_id(download_id)?.into_iter().next())
    }

    fn find_by_download_id_and_type(
        &self,
        download_id: &str,
        event_type: HistoryEventType,
    ) -> Result<Vec<HistoryEvent>> {
        Ok(self
            .find_by_download_id(download_id)?
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect())
    }

    /// Whether the newest grab-or-import event for the download is an import.
    fn is_download_imported(&self, download_id: &str) -> Result<bool> {
        Ok(self
            .find_by_download_id(download_id)?
            .iter()
            .find(|e| {
                matches!(
                    e.event_type,
                    HistoryEventType::Grabbed | HistoryEventType::DownloadFolderImported
                )
            })
            .map(|e| e.event_type == HistoryEventType::DownloadFolderImported)
            .unwrap_or(false))
    }
}

pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, HISTORY_VERSIONED_SCHEMAS, "history")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(open_in_memory(HISTORY_VERSIONED_SCHEMAS)?)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("history connection mutex poisoned"))
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<HistoryEvent> {
        let quality: String = row.get("quality")?;
        let data: String = row.get("data")?;
        let date_ms: i64 = row.get("date")?;
        Ok(HistoryEvent {
            id: row.get("id")?,
            event_type: HistoryEventType::from_db_str(&row.get::<_, String>("event_type")?),
            media_id: row.get("media_id")?,
            download_id: row.get("download_id")?,
            source_title: row.get("source_title")?,
            quality: QualityModel::from_json(&quality).unwrap_or_default(),
            date: millis_to_date(date_ms),
            data: serde_json::from_str::<HashMap<String, String>>(&data).unwrap_or_default(),
        })
    }

    fn query_events(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Vec<HistoryEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let events = stmt
            .query_map([param], Self::row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

fn millis_to_date(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, event: &HistoryEvent) -> Result<i64> {
        let data = serde_json::to_string(&event.data).context("Failed to encode history data")?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO history (event_type, media_id, download_id, source_title, quality, date, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_type.as_str(),
                event.media_id,
                event.download_id,
                event.source_title,
                event.quality.to_json(),
                event.date.timestamp_millis(),
                data,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<HistoryEvent>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT * FROM history WHERE id = ?1",
                params![id],
                Self::row_to_event,
            )
            .optional()?)
    }

    fn find_by_download_id(&self, download_id: &str) -> Result<Vec<HistoryEvent>> {
        self.query_events(
            "SELECT * FROM history WHERE download_id = ?1 ORDER BY date DESC, id DESC",
            &download_id,
        )
    }

    fn find_by_media_id(&self, media_id: i64) -> Result<Vec<HistoryEvent>> {
        self.query_events(
            "SELECT * FROM history WHERE media_id = ?1 ORDER BY date DESC, id DESC",
            &media_id,
        )
    }
}
