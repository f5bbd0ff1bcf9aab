//! SQLite store backend for persistent storage.

use super::{ImageStore, StoredImage};
use crate::core::record::{ImageHashRecord, ImageHashes, ImageId, PHASH_BLOCK_COUNT};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed persistent store
///
/// Uses WAL mode so the upload path can keep reading while a rehash
/// batch writes. Hash records cascade away with their image row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Self::initialize(conn, path.to_path_buf())
    }

    /// A private database that lives as long as the store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;

        Self::initialize(conn, PathBuf::from(":memory:"))
    }

    fn initialize(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                rehashed INTEGER NOT NULL DEFAULT 0,
                rehashed_at INTEGER
            )",
            [],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_pending
             ON images(rehashed, created_at)",
            [],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let block_defs: String = block_columns()
            .iter()
            .map(|column| format!("{column} TEXT NOT NULL,\n"))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS image_hashes (
                    image_id INTEGER PRIMARY KEY
                        REFERENCES images(id) ON DELETE CASCADE,
                    ahash TEXT NOT NULL,
                    dhash TEXT NOT NULL,
                    phash TEXT NOT NULL,
                    {block_defs}
                    updated_at INTEGER NOT NULL
                )"
            ),
            [],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        for column in block_columns() {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS idx_{column} ON image_hashes({column})"),
                [],
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    /// Microseconds since the Unix epoch
    fn to_timestamp(time: DateTime<Utc>) -> i64 {
        time.timestamp_micros()
    }

    fn from_timestamp(micros: i64) -> Result<DateTime<Utc>, StoreError> {
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| StoreError::QueryFailed(format!("timestamp out of range: {micros}")))
    }

    fn read_image(row: &Row<'_>) -> rusqlite::Result<RawImage> {
        Ok(RawImage {
            id: row.get(0)?,
            path: row.get(1)?,
            created_at: row.get(2)?,
            rehashed: row.get(3)?,
            rehashed_at: row.get(4)?,
        })
    }
}

/// Names of the sixteen pHash block columns
fn block_columns() -> [String; PHASH_BLOCK_COUNT] {
    std::array::from_fn(|i| format!("phash_block_{i}"))
}

/// Columns as they come out of `images`, before timestamp conversion
struct RawImage {
    id: ImageId,
    path: String,
    created_at: i64,
    rehashed: bool,
    rehashed_at: Option<i64>,
}

impl RawImage {
    fn into_stored(self) -> Result<StoredImage, StoreError> {
        Ok(StoredImage {
            id: self.id,
            path: PathBuf::from(self.path),
            created_at: SqliteStore::from_timestamp(self.created_at)?,
            rehashed: self.rehashed,
            rehashed_at: self
                .rehashed_at
                .map(SqliteStore::from_timestamp)
                .transpose()?,
        })
    }
}

fn upsert_sql() -> String {
    let columns = block_columns();
    let names = columns.join(", ");
    let placeholders: Vec<String> = (5..5 + PHASH_BLOCK_COUNT).map(|i| format!("?{i}")).collect();
    let updates: String = columns
        .iter()
        .map(|column| format!("{column} = excluded.{column}, "))
        .collect();

    format!(
        "INSERT INTO image_hashes (image_id, ahash, dhash, phash, {names}, updated_at)
         VALUES (?1, ?2, ?3, ?4, {placeholders}, ?{updated})
         ON CONFLICT(image_id) DO UPDATE SET
             ahash = excluded.ahash,
             dhash = excluded.dhash,
             phash = excluded.phash,
             {updates}
             updated_at = excluded.updated_at",
        placeholders = placeholders.join(", "),
        updated = 5 + PHASH_BLOCK_COUNT,
    )
}

fn write_hashes(
    conn: &Connection,
    image_id: ImageId,
    hashes: &ImageHashes,
) -> Result<(), StoreError> {
    let mut values: Vec<rusqlite::types::Value> = vec![
        image_id.into(),
        hashes.ahash.clone().into(),
        hashes.dhash.clone().into(),
        hashes.phash.clone().into(),
    ];
    values.extend(hashes.phash_blocks.iter().map(|b| b.to_string().into()));
    values.push(SqliteStore::to_timestamp(Utc::now()).into());

    conn.execute(&upsert_sql(), params_from_iter(values))
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::ImageNotFound { image_id }
            } else {
                StoreError::QueryFailed(e.to_string())
            }
        })?;

    Ok(())
}

/// The image row a hash record points at is gone
fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

impl ImageStore for SqliteStore {
    fn register_image(
        &self,
        path: &Path,
        created_at: DateTime<Utc>,
        hashes: &ImageHashes,
    ) -> Result<ImageId, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        tx.execute(
            "INSERT INTO images (path, created_at, rehashed) VALUES (?, ?, 0)",
            params![path.to_string_lossy(), Self::to_timestamp(created_at)],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let image_id = tx.last_insert_rowid();

        write_hashes(&tx, image_id, hashes)?;

        tx.commit()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(image_id)
    }

    fn image(&self, image_id: ImageId) -> Result<Option<StoredImage>, StoreError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT id, path, created_at, rehashed, rehashed_at FROM images WHERE id = ?",
            [image_id],
            Self::read_image,
        )
        .optional()
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?
        .map(RawImage::into_stored)
        .transpose()
    }

    fn pending_rehash(&self, limit: usize) -> Result<Vec<StoredImage>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, path, created_at, rehashed, rehashed_at FROM images
                 WHERE rehashed = 0
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?",
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([limit as i64], Self::read_image)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        rows.into_iter().map(RawImage::into_stored).collect()
    }

    fn mark_rehashed(&self, image_id: ImageId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE images SET rehashed = 1, rehashed_at = ? WHERE id = ?",
                params![Self::to_timestamp(at), image_id],
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::ImageNotFound { image_id });
        }
        Ok(())
    }

    fn hash_record(&self, image_id: ImageId) -> Result<Option<ImageHashRecord>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT ahash, dhash, phash, {} FROM image_hashes WHERE image_id = ?",
            block_columns().join(", ")
        );
        let row = conn
            .query_row(&sql, [image_id], |row| {
                let blocks: [String; PHASH_BLOCK_COUNT] = {
                    let mut blocks: [String; PHASH_BLOCK_COUNT] = Default::default();
                    for (i, block) in blocks.iter_mut().enumerate() {
                        *block = row.get(3 + i)?;
                    }
                    blocks
                };
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    blocks,
                ))
            })
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let Some((ahash, dhash, phash, blocks)) = row else {
            return Ok(None);
        };

        let hashes = ImageHashes::from_stored(ahash, dhash, phash, blocks).map_err(|e| {
            StoreError::QueryFailed(format!("invalid hash record for image {image_id}: {e}"))
        })?;
        Ok(Some(hashes.into_record(image_id)))
    }

    fn upsert_hashes(&self, record: &ImageHashRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM images WHERE id = ?",
                [record.image_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .is_some();
        if !exists {
            return Err(StoreError::ImageNotFound {
                image_id: record.image_id,
            });
        }

        write_hashes(&conn, record.image_id, &record.hashes)
    }

    fn delete_image(&self, image_id: ImageId) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM images WHERE id = ?", [image_id])
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn block_candidates(
        &self,
        image_id: ImageId,
        min_shared: usize,
    ) -> Result<Vec<ImageId>, StoreError> {
        let conn = self.lock()?;

        let shared = block_columns()
            .iter()
            .map(|column| format!("(other.{column} = target.{column})"))
            .collect::<Vec<_>>()
            .join(" + ");
        let sql = format!(
            "SELECT other.image_id
             FROM image_hashes AS target, image_hashes AS other
             WHERE target.image_id = ?1
               AND other.image_id != ?1
               AND ({shared}) >= ?2
             ORDER BY other.image_id ASC"
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let ids = stmt
            .query_map(params![image_id, min_shared as i64], |row| row.get(0))
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .collect::<Result<Vec<ImageId>, _>>()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(ids)
    }
}
