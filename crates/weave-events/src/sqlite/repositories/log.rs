//! Log repository — operational log records.
//!
//! Log rows are written asynchronously by the
//! [`LogWriter`](crate::logging::LogWriter) and are never read by
//! reconstruction. They exist for post-mortem debugging of agent runs.

use rusqlite::{Connection, params};
use weave_core::now_iso;

use crate::errors::Result;
use crate::sqlite::row_types::LogRow;

/// A log record to insert (id and timestamp are assigned on write).
#[derive(Clone, Debug)]
pub struct NewLogRecord {
    /// Session the record belongs to, when known.
    pub session_id: Option<String>,
    /// Level name (debug, info, warn, error).
    pub level: String,
    /// Numeric level for range filtering.
    pub level_num: i64,
    /// Component tag.
    pub component: String,
    /// Log message.
    pub message: String,
    /// Error message, when the record carries one.
    pub error_message: Option<String>,
    /// Error stack, when the record carries one.
    pub error_stack: Option<String>,
}

/// Log repository — stateless, every method takes `&Connection`.
pub struct LogRepo;

impl LogRepo {
    /// Insert a log record, stamping the current time.
    pub fn insert(conn: &Connection, record: &NewLogRecord) -> Result<i64> {
        let _ = conn.execute(
            "INSERT INTO logs (session_id, timestamp, level, level_num, component, message, error_message, error_stack)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.session_id,
                now_iso(),
                record.level,
                record.level_num,
                record.component,
                record.message,
                record.error_message,
                record.error_stack,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Log records for a session, oldest first.
    pub fn get_by_session(
        conn: &Connection,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<LogRow>> {
        use std::fmt::Write;
        let mut sql = String::from(
            "SELECT id, session_id, timestamp, level, level_num, component, message, error_message, error_stack
             FROM logs WHERE session_id = ?1 ORDER BY id ASC",
        );
        if let Some(limit) = limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent records across all sessions, newest first.
    pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<LogRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, timestamp, level, level_num, component, message, error_message, error_stack
             FROM logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total record count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogRow> {
        Ok(LogRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            timestamp: row.get(2)?,
            level: row.get(3)?,
            level_num: row.get(4)?,
            component: row.get(5)?,
            message: row.get(6)?,
            error_message: row.get(7)?,
            error_stack: row.get(8)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
