//! SQLite-backed library storage.

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::models::{Media, MediaFile, MediaInfo};
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use crate::qualities::QualityModel;
use crate::sqlite_persistence::{open_in_memory, open_versioned};

/// Read/write contract for media entities and their linked files.
pub trait LibraryStore: Send + Sync {
    fn add_media(&self, media: &Media) -> Result<i64>;
    fn get_media(&self, id: i64) -> Result<Option<Media>>;
    fn find_media_by_collection(&self, collection_id: i64) -> Result<Vec<Media>>;

    fn get_media_many(&self, ids: &[i64]) -> Result<Vec<Media>> {
        let mut media = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(m) = self.get_media(*id)? {
                media.push(m);
            }
        }
        Ok(media)
    }

    fn get_media_files(&self, media_id: i64) -> Result<Vec<MediaFile>>;
    fn add_media_file(&self, file: &MediaFile) -> Result<i64>;
    fn delete_media_file(&self, id: i64) -> Result<bool>;
}

pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, LIBRARY_VERSIONED_SCHEMAS, "library")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(open_in_memory(LIBRARY_VERSIONED_SCHEMAS)?)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("library connection mutex poisoned"))
    }

    fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<Media> {
        Ok(Media {
            id: row.get("id")?,
            title: row.get("title")?,
            year: row.get("year")?,
            collection_id: row.get("collection_id")?,
            path: PathBuf::from(row.get::<_, String>("path")?),
            root_folder: PathBuf::from(row.get::<_, String>("root_folder")?),
            runtime_minutes: row.get("runtime_minutes")?,
            monitored_unit_count: row.get("monitored_unit_count")?,
            monitored: row.get::<_, i64>("monitored")? != 0,
        })
    }

    fn row_to_media_file(row: &rusqlite::Row) -> rusqlite::Result<MediaFile> {
        let quality: String = row.get("quality")?;
        let media_info: Option<String> = row.get("media_info")?;
        let date_added: i64 = row.get("date_added")?;
        Ok(MediaFile {
            id: row.get("id")?,
            media_id: row.get("media_id")?,
            relative_path: row.get("relative_path")?,
            size: row.get::<_, i64>("size")?.max(0) as u64,
            quality: QualityModel::from_json(&quality).unwrap_or_default(),
            media_info: media_info.and_then(|s| serde_json::from_str::<MediaInfo>(&s).ok()),
            release_group: row.get("release_group")?,
            scene_name: row.get("scene_name")?,
            custom_format_score: row.get("custom_format_score")?,
            unit: row.get("unit")?,
            date_added: Utc
                .timestamp_opt(date_added, 0)
                .single()
                .unwrap_or_default(),
        })
    }
}

impl LibraryStore for SqliteLibraryStore {
    fn add_media(&self, media: &Media) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO media (id, title, year, collection_id, path, root_folder, runtime_minutes, monitored_unit_count, monitored)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                if media.id > 0 { Some(media.id) } else { None },
                media.title,
                media.year,
                media.collection_id,
                media.path.to_string_lossy(),
                media.root_folder.to_string_lossy(),
                media.runtime_minutes,
                media.monitored_unit_count,
                media.monitored as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_media(&self, id: i64) -> Result<Option<Media>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT * FROM media WHERE id = ?1",
                params![id],
                Self::row_to_media,
            )
            .optional()?)
    }

    fn find_media_by_collection(&self, collection_id: i64) -> Result<Vec<Media>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM media WHERE collection_id = ?1 ORDER BY id")?;
        let media = stmt
            .query_map(params![collection_id], Self::row_to_media)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(media)
    }

    fn get_media_files(&self, media_id: i64) -> Result<Vec<MediaFile>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM media_files WHERE media_id = ?1 ORDER BY id")?;
        let files = stmt
            .query_map(params![media_id], Self::row_to_media_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    fn add_media_file(&self, file: &MediaFile) -> Result<i64> {
        let media_info = file
            .media_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO media_files (media_id, relative_path, size, quality, media_info, release_group, scene_name, custom_format_score, unit, date_added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                file.media_id,
                file.relative_path,
                file.size as i64,
                file.quality.to_json(),
                media_info,
                file.release_group,
                file.scene_name,
                file.custom_format_score,
                file.unit,
                file.date_added.timestamp(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_media_file(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM media_files WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qualities::Quality;

    fn media_file(media_id: i64, name: &str, size: u64) -> MediaFile {
        MediaFile {
            id: 0,
            media_id,
            relative_path: name.to_string(),
            size,
            quality: QualityModel::new(Quality::Bluray1080p),
            media_info: Some(MediaInfo {
                runtime_seconds: Some(5400.0),
                audio_stream_count: 1,
                ..Default::default()
            }),
            release_group: Some("GRP".to_string()),
            scene_name: None,
            custom_format_score: 10,
            unit: None,
            date_added: Utc::now(),
        }
    }

    #[test]
    fn test_media_roundtrip() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let mut media = Media::new(0, "Movie Title", PathBuf::from("/library/movies/Movie Title"));
        media.year = Some(2020);
        media.collection_id = Some(3);

        let id = store.add_media(&media).unwrap();
        let loaded = store.get_media(id).unwrap().unwrap();
        assert_eq!(loaded.title, "Movie Title");
        assert_eq!(loaded.year, Some(2020));
        assert_eq!(loaded.root_folder, PathBuf::from("/library/movies"));
        assert_eq!(store.find_media_by_collection(3).unwrap().len(), 1);
        assert!(store.get_media(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_media_files_add_and_delete() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let media_id = store
            .add_media(&Media::new(0, "Movie", PathBuf::from("/library/Movie")))
            .unwrap();

        let file_id = store
            .add_media_file(&media_file(media_id, "movie.mkv", 1000))
            .unwrap();
        let files = store.get_media_files(media_id).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 1000);
        assert_eq!(files[0].custom_format_score, 10);
        assert_eq!(
            files[0].media_info.as_ref().unwrap().runtime_seconds,
            Some(5400.0)
        );

        assert!(store.delete_media_file(file_id).unwrap());
        assert!(!store.delete_media_file(file_id).unwrap());
        assert!(store.get_media_files(media_id).unwrap().is_empty());
    }
}
