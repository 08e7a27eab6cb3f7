//! Database schema for history.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// History Table - Version 0
// =============================================================================

const HISTORY_TABLE_V0: Table = Table {
    name: "history",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("event_type", &SqlType::Text, non_null = true),
        sqlite_column!("media_id", &SqlType::Integer, non_null = true),
        sqlite_column!("download_id", &SqlType::Text),
        sqlite_column!("source_title", &SqlType::Text, non_null = true),
        sqlite_column!("quality", &SqlType::Text, non_null = true),
        // Milliseconds since epoch.
        sqlite_column!("date", &SqlType::Integer, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_history_download_id", "download_id, date"),
        ("idx_history_media_id", "media_id, date"),
    ],
};

pub const HISTORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[HISTORY_TABLE_V0],
    migration: None,
}];
