//! Database schema for library.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Library Tables - Version 0
// =============================================================================

const MEDIA_TABLE_V0: Table = Table {
    name: "media",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("collection_id", &SqlType::Integer),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!("root_folder", &SqlType::Text, non_null = true),
        sqlite_column!("runtime_minutes", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!(
            "monitored_unit_count",
            &SqlType::Integer,
            default_value = Some("1")
        ),
        sqlite_column!("monitored", &SqlType::Integer, default_value = Some("1")),
    ],
    indices: &[("idx_media_collection", "collection_id")],
};

const MEDIA_FILES_TABLE_V0: Table = Table {
    name: "media_files",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "media_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "media",
                foreign_column: "id",
            })
        ),
        sqlite_column!("relative_path", &SqlType::Text, non_null = true),
        sqlite_column!("size", &SqlType::Integer, non_null = true),
        sqlite_column!("quality", &SqlType::Text, non_null = true),
        sqlite_column!("media_info", &SqlType::Text),
        sqlite_column!("release_group", &SqlType::Text),
        sqlite_column!("scene_name", &SqlType::Text),
        sqlite_column!(
            "custom_format_score",
            &SqlType::Integer,
            default_value = Some("0")
        ),
        sqlite_column!("unit", &SqlType::Integer),
        sqlite_column!(
            "date_added",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_media_files_media", "media_id")],
};

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[MEDIA_TABLE_V0, MEDIA_FILES_TABLE_V0],
    migration: None,
}];
