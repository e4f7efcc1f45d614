//! Database schema for tracks.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// One row per track identity.
const TRACK_TABLE_V0: Table = Table {
    name: "track",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("author", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("done", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("error", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!("error_message", &SqlType::Text),
    ],
    indices: &[("idx_track_error", "error")],
};

pub const TRACK_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TRACK_TABLE_V0],
}];
