//! Blob repository — content-addressable storage with SHA-256 dedup.
//!
//! Blobs store large content (tool outputs, updated prompts) separately from
//! events. Content is hashed with SHA-256: storing the same bytes twice
//! increments the reference count instead of creating a duplicate row. A
//! hash race between two simultaneous inserts resolves to a refcount bump.

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use weave_core::{BlobId, now_iso};

use crate::errors::Result;
use crate::sqlite::row_types::BlobRow;

/// Outcome of storing a blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreBlobResult {
    /// Blob ID (existing row's id when deduplicated).
    pub id: String,
    /// SHA-256 hex hash of the content.
    pub hash: String,
    /// Whether an existing row was reused.
    pub deduplicated: bool,
}

/// Storage size summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSizeInfo {
    /// Total original (uncompressed) bytes.
    pub original: i64,
    /// Total stored bytes.
    pub stored: i64,
}

/// Blob repository — stateless, every method takes `&Connection`.
pub struct BlobRepo;

impl BlobRepo {
    /// Store content, deduplicating by SHA-256 hash.
    ///
    /// If identical content already exists, increments the reference count
    /// and returns the existing blob ID. A UNIQUE(hash) violation from a
    /// racing insert is retried as a refcount bump.
    pub fn store(conn: &Connection, content: &[u8], mime_type: &str) -> Result<StoreBlobResult> {
        let hash = hex_sha256(content);

        if let Some(id) = Self::bump_existing(conn, &hash)? {
            return Ok(StoreBlobResult {
                id,
                hash,
                deduplicated: true,
            });
        }

        let id = BlobId::new().into_string();
        let size = i64::try_from(content.len()).unwrap_or(i64::MAX);

        let inserted = conn.execute(
            "INSERT INTO blobs (id, hash, content, mime_type, size_original, size_compressed, compression, ref_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'none', 1, ?7)",
            params![id, hash, content, mime_type, size, size, now_iso()],
        );

        match inserted {
            Ok(_) => Ok(StoreBlobResult {
                id,
                hash,
                deduplicated: false,
            }),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race to another writer with the same content.
                let id = Self::bump_existing(conn, &hash)?
                    .ok_or_else(|| crate::errors::EventStoreError::Internal(
                        format!("blob hash {hash} conflicted but row is missing"),
                    ))?;
                Ok(StoreBlobResult {
                    id,
                    hash,
                    deduplicated: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn bump_existing(conn: &Connection, hash: &str) -> Result<Option<String>> {
        let existing: Option<String> = conn
            .query_row("SELECT id FROM blobs WHERE hash = ?1", params![hash], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            let _ = conn.execute(
                "UPDATE blobs SET ref_count = ref_count + 1 WHERE id = ?1",
                params![id],
            )?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Get blob content by ID.
    pub fn get_content(conn: &Connection, blob_id: &str) -> Result<Option<Vec<u8>>> {
        let content: Option<Vec<u8>> = conn
            .query_row(
                "SELECT content FROM blobs WHERE id = ?1",
                params![blob_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Get full blob record by ID.
    pub fn get_by_id(conn: &Connection, blob_id: &str) -> Result<Option<BlobRow>> {
        let row = conn
            .query_row(
                "SELECT id, hash, content, mime_type, size_original, size_compressed, compression, ref_count, created_at
                 FROM blobs WHERE id = ?1",
                params![blob_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get blob by SHA-256 hash.
    pub fn get_by_hash(conn: &Connection, hash: &str) -> Result<Option<BlobRow>> {
        let row = conn
            .query_row(
                "SELECT id, hash, content, mime_type, size_original, size_compressed, compression, ref_count, created_at
                 FROM blobs WHERE hash = ?1",
                params![hash],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get reference count for a blob.
    pub fn get_ref_count(conn: &Connection, blob_id: &str) -> Result<Option<i64>> {
        let count: Option<i64> = conn
            .query_row(
                "SELECT ref_count FROM blobs WHERE id = ?1",
                params![blob_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count)
    }

    /// Decrement reference count (floor at 0). Returns new count if the blob
    /// exists. Rows that reach zero are not purged automatically.
    pub fn release(conn: &Connection, blob_id: &str) -> Result<Option<i64>> {
        let _ = conn.execute(
            "UPDATE blobs SET ref_count = ref_count - 1 WHERE id = ?1 AND ref_count > 0",
            params![blob_id],
        )?;
        Self::get_ref_count(conn, blob_id)
    }

    /// Delete all blobs with zero references. Returns count deleted.
    pub fn delete_unreferenced(conn: &Connection) -> Result<usize> {
        let changed = conn.execute("DELETE FROM blobs WHERE ref_count <= 0", [])?;
        Ok(changed)
    }

    /// Count total blobs.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get total storage usage.
    pub fn get_total_size(conn: &Connection) -> Result<BlobSizeInfo> {
        let (original, stored) = conn.query_row(
            "SELECT COALESCE(SUM(size_original), 0), COALESCE(SUM(size_compressed), 0) FROM blobs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(BlobSizeInfo { original, stored })
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlobRow> {
        Ok(BlobRow {
            id: row.get(0)?,
            hash: row.get(1)?,
            content: row.get(2)?,
            mime_type: row.get(3)?,
            size_original: row.get(4)?,
            size_compressed: row.get(5)?,
            compression: row.get(6)?,
            ref_count: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
