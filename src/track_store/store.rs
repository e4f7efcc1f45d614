//! SQLite-backed track store implementation.

use super::models::TrackRecord;
use super::schema::TRACK_VERSIONED_SCHEMAS;
use super::trait_def::TrackStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Inserts a row or merges into the existing one.
///
/// Empty text never overwrites stored text. `done` only goes back to 0 when
/// the incoming row carries `error = 1`.
const UPSERT_SQL: &str = r#"
    INSERT INTO track (id, title, author, artist, album, done, genre, error, error_message)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        title = CASE WHEN excluded.title <> '' THEN excluded.title ELSE track.title END,
        author = CASE WHEN excluded.author <> '' THEN excluded.author ELSE track.author END,
        artist = CASE WHEN excluded.artist <> '' THEN excluded.artist ELSE track.artist END,
        album = CASE WHEN excluded.album <> '' THEN excluded.album ELSE track.album END,
        genre = CASE WHEN excluded.genre <> '' THEN excluded.genre ELSE track.genre END,
        done = CASE WHEN excluded.error = 1 THEN excluded.done
                    ELSE MAX(COALESCE(track.done, 0), excluded.done) END,
        error = excluded.error,
        error_message = excluded.error_message
"#;

/// SQLite-backed track store.
#[derive(Clone)]
pub struct SqliteTrackStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrackStore {
    /// Open (or create) the track database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open track database at {:?}", db_path))?;
        open_versioned(&conn, TRACK_VERSIONED_SCHEMAS, "track")?;
        info!("Track database ready at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        open_versioned(&conn, TRACK_VERSIONED_SCHEMAS, "track")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TrackRecord> {
        Ok(TrackRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            author: row.get::<_, Option<String>>("author")?.unwrap_or_default(),
            artist: row.get::<_, Option<String>>("artist")?.unwrap_or_default(),
            album: row.get::<_, Option<String>>("album")?.unwrap_or_default(),
            genre: row.get::<_, Option<String>>("genre")?.unwrap_or_default(),
            done: row.get::<_, Option<i64>>("done")?.unwrap_or(0) == 1,
            error: row.get::<_, Option<i64>>("error")?.unwrap_or(0) == 1,
            error_message: row
                .get::<_, Option<String>>("error_message")?
                .unwrap_or_default(),
        })
    }
}

impl TrackStore for SqliteTrackStore {
    fn upsert(&self, record: &TrackRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            UPSERT_SQL,
            params![
                record.id,
                record.title,
                record.author,
                record.artist,
                record.album,
                record.done as i64,
                record.genre,
                record.error as i64,
                record.error_message,
            ],
        )
        .with_context(|| format!("Failed to upsert track {}", record.id))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<TrackRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT * FROM track WHERE id = ?1",
                [id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }
}
