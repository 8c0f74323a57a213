//! SQLite-backed implementation of [`MetadataStore`].
//!
//! Upload times are stored as epoch milliseconds so range filters and hour
//! bucketing run inside the engine. The connection is shared behind an async
//! mutex; every call takes the lock for a single statement or a short group
//! of statements and never holds it across an await.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    HourlyCount, Image, ImageFilter, ImageId, ImageRecord, MetadataStore, NewImage, OwnerCount,
    User, UserId, UserSummary,
};
use crate::error::StoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users (id),
        uploaded_at INTEGER NOT NULL,
        original_filename TEXT NOT NULL,
        storage_key TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_images_uploaded_at ON images (uploaded_at);
    CREATE INDEX IF NOT EXISTS idx_images_owner_id ON images (owner_id);
";

/// Shared `WHERE` body for every filtered query. Parameters `?1`..`?3` are
/// the lower bound, the exclusive upper bound and the owner id; NULL disables
/// the corresponding condition.
const FILTER_CLAUSE: &str = "(?1 IS NULL OR i.uploaded_at >= ?1) \
     AND (?2 IS NULL OR i.uploaded_at < ?2) \
     AND (?3 IS NULL OR i.owner_id = ?3)";

/// SQLite metadata store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Bind values for [`FILTER_CLAUSE`].
fn filter_params(filter: &ImageFilter) -> (Option<i64>, Option<i64>, Option<i64>) {
    (
        filter.from.map(|t| t.timestamp_millis()),
        filter.until.map(|t| t.timestamp_millis()),
        filter.owner_id,
    )
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        uploaded_at: millis_to_utc(row.get(2)?),
        original_filename: row.get(3)?,
        storage_key: row.get(4)?,
        created_at: millis_to_utc(row.get(5)?),
    })
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                "SELECT id, name, password_hash FROM users WHERE name = ?1",
                params![name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT id, name FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    async fn insert_user(&self, name: &str, password_hash: &str) -> Result<UserId, StoreError> {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO users (name, password_hash) VALUES (?1, ?2)",
            params![name, password_hash],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateUser(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reserve_image(&self, image: &NewImage) -> Result<ImageId, StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO images (owner_id, uploaded_at, original_filename, storage_key, created_at) \
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![
                image.owner_id,
                image.uploaded_at.timestamp_millis(),
                image.original_filename,
                image.created_at.timestamp_millis(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(image_id = id, owner_id = image.owner_id, "Reserved image record");
        Ok(id)
    }

    async fn set_storage_key(&self, id: ImageId, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE images SET storage_key = ?1 WHERE id = ?2",
            params![key, id],
        )?;
        Ok(updated > 0)
    }

    async fn find_image(&self, id: ImageId) -> Result<Option<Image>, StoreError> {
        let conn = self.conn.lock().await;
        let image = conn
            .query_row(
                "SELECT id, owner_id, uploaded_at, original_filename, storage_key, created_at \
                 FROM images WHERE id = ?1",
                params![id],
                image_from_row,
            )
            .optional()?;
        Ok(image)
    }

    async fn delete_image(&self, id: ImageId) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM images WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    async fn find_images(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, StoreError> {
        let (from, until, owner) = filter_params(filter);
        let sql = format!(
            "SELECT i.id, i.storage_key, i.original_filename, i.uploaded_at, u.name \
             FROM images i JOIN users u ON u.id = i.owner_id \
             WHERE {FILTER_CLAUSE} \
             ORDER BY i.id"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![from, until, owner], |row| {
                Ok(ImageRecord {
                    id: row.get(0)?,
                    storage_key: row.get(1)?,
                    original_filename: row.get(2)?,
                    uploaded_at: millis_to_utc(row.get(3)?),
                    owner_name: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn count_by_hour(
        &self,
        filter: &ImageFilter,
        offset_secs: i64,
    ) -> Result<Vec<HourlyCount>, StoreError> {
        let (from, until, owner) = filter_params(filter);
        let sql = format!(
            "SELECT CAST(strftime('%H', (i.uploaded_at / 1000) + ?4, 'unixepoch') AS INTEGER) AS hour, \
                    COUNT(*) \
             FROM images i \
             WHERE {FILTER_CLAUSE} \
             GROUP BY hour"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(params![from, until, owner, offset_secs], |row| {
                Ok(HourlyCount {
                    hour: row.get::<_, i64>(0)? as u32,
                    total_images: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    async fn count_by_owner(&self, filter: &ImageFilter) -> Result<Vec<OwnerCount>, StoreError> {
        let (from, until, owner) = filter_params(filter);
        let sql = format!(
            "SELECT i.owner_id, COUNT(*), u.name \
             FROM images i JOIN users u ON u.id = i.owner_id \
             WHERE {FILTER_CLAUSE} \
             GROUP BY i.owner_id, u.name"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(params![from, until, owner], |row| {
                Ok(OwnerCount {
                    owner_id: row.get(0)?,
                    total_images: row.get::<_, i64>(1)? as u64,
                    owner_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    async fn delete_reservations_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM images WHERE storage_key IS NULL AND created_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(deleted as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
