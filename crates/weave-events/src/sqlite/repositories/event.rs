//! Event repository — the append-only event log.
//!
//! Events are immutable and form a tree via `parent_id` chains. This
//! repository provides the low-level insert, tree traversal (ancestors and
//! descendants via recursive CTEs), and query operations. Sequence numbers
//! are claimed inside the caller's transaction so concurrent writers can
//! never allocate the same number.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::EventRow;
use crate::types::SessionEvent;

const COLUMNS: &str = "id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload";

/// Options for listing events.
#[derive(Default)]
pub struct ListEventsOptions {
    /// Maximum number of events to return.
    pub limit: Option<i64>,
    /// Number of events to skip.
    pub offset: Option<i64>,
}

/// Aggregate token usage for a session, computed from payloads.
#[derive(Debug, Clone, Default)]
pub struct TokenUsageSummary {
    /// Total input tokens.
    pub input_tokens: i64,
    /// Total output tokens.
    pub output_tokens: i64,
    /// Total cache read tokens.
    pub cache_read_tokens: i64,
    /// Total cache creation tokens.
    pub cache_creation_tokens: i64,
}

/// Event repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Insert a single event row. Runs inside the caller's transaction.
    pub fn insert(conn: &Connection, event: &SessionEvent) -> Result<()> {
        let payload_str = serde_json::to_string(&event.payload)?;
        let _ = conn.execute(
            "INSERT INTO events (id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.session_id,
                event.workspace_id,
                event.parent_id,
                event.sequence,
                event.timestamp,
                event.event_type.as_str(),
                payload_str,
            ],
        )?;
        Ok(())
    }

    /// Get a single event by ID.
    pub fn get_by_id(conn: &Connection, event_id: &str) -> Result<Option<EventRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM events WHERE id = ?1"),
                params![event_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get events for a session, ordered by sequence.
    pub fn get_by_session(
        conn: &Connection,
        session_id: &str,
        opts: &ListEventsOptions,
    ) -> Result<Vec<EventRow>> {
        use std::fmt::Write;
        let mut sql =
            format!("SELECT {COLUMNS} FROM events WHERE session_id = ?1 ORDER BY sequence ASC");
        if let Some(limit) = opts.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        if let Some(offset) = opts.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Next sequence number for a session: `max(sequence) + 1`, or 0 for an
    /// empty session. Must be called inside the insert's transaction.
    pub fn get_next_sequence(conn: &Connection, session_id: &str) -> Result<i64> {
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.map_or(0, |m| m + 1))
    }

    /// Ancestor chain from root to the given event (inclusive).
    ///
    /// Follows `parent_id` upward, crossing session boundaries at
    /// `session.fork` roots. Parents are strictly older, so the walk cannot
    /// cycle; the depth guard only bounds pathological data.
    pub fn get_ancestors(conn: &Connection, event_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "WITH RECURSIVE ancestors(id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload, lvl) AS (
               SELECT id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload, 0
               FROM events WHERE id = ?1
               UNION ALL
               SELECT e.id, e.session_id, e.workspace_id, e.parent_id, e.sequence, e.timestamp, e.type, e.payload, a.lvl + 1
               FROM events e JOIN ancestors a ON e.id = a.parent_id
               WHERE a.lvl < 100000
             )
             SELECT id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload
             FROM ancestors ORDER BY lvl DESC",
        )?;
        let rows = stmt
            .query_map(params![event_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Direct children of an event.
    pub fn get_children(conn: &Connection, event_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM events WHERE parent_id = ?1 ORDER BY sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![event_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All descendants of an event (recursive CTE downward).
    pub fn get_descendants(conn: &Connection, event_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "WITH RECURSIVE descendants(id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload, lvl) AS (
               SELECT id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload, 0
               FROM events WHERE parent_id = ?1
               UNION ALL
               SELECT e.id, e.session_id, e.workspace_id, e.parent_id, e.sequence, e.timestamp, e.type, e.payload, d.lvl + 1
               FROM events e JOIN descendants d ON e.parent_id = d.id
               WHERE d.lvl < 100000
             )
             SELECT id, session_id, workspace_id, parent_id, sequence, timestamp, type, payload
             FROM descendants ORDER BY timestamp ASC, sequence ASC",
        )?;
        let rows = stmt
            .query_map(params![event_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events after a specific sequence number.
    pub fn get_since(
        conn: &Connection,
        session_id: &str,
        after_sequence: i64,
    ) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM events WHERE session_id = ?1 AND sequence > ?2 ORDER BY sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id, after_sequence], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The latest event for a session by sequence.
    pub fn get_latest(conn: &Connection, session_id: &str) -> Result<Option<EventRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM events WHERE session_id = ?1 ORDER BY sequence DESC LIMIT 1"
                ),
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Count events in a session.
    pub fn count_by_session(conn: &Connection, session_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Highest sequence of events of a given type, if any exist.
    pub fn max_sequence_of_type(
        conn: &Connection,
        session_id: &str,
        event_type: &str,
    ) -> Result<Option<i64>> {
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE session_id = ?1 AND type = ?2",
                params![session_id, event_type],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max)
    }

    /// Check if event exists.
    pub fn exists(conn: &Connection, event_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
            params![event_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Delete all events for a session. Returns count deleted.
    pub fn delete_by_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let changed = conn.execute(
            "DELETE FROM events WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(changed)
    }

    /// Aggregate token usage across a session's event payloads.
    pub fn get_token_usage_summary(
        conn: &Connection,
        session_id: &str,
    ) -> Result<TokenUsageSummary> {
        let summary = conn.query_row(
            "SELECT COALESCE(SUM(json_extract(payload, '$.tokenUsage.inputTokens')), 0),
                    COALESCE(SUM(json_extract(payload, '$.tokenUsage.outputTokens')), 0),
                    COALESCE(SUM(json_extract(payload, '$.tokenUsage.cacheReadTokens')), 0),
                    COALESCE(SUM(json_extract(payload, '$.tokenUsage.cacheCreationTokens')), 0)
             FROM events WHERE session_id = ?1",
            params![session_id],
            |row| {
                Ok(TokenUsageSummary {
                    input_tokens: row.get(0)?,
                    output_tokens: row.get(1)?,
                    cache_read_tokens: row.get(2)?,
                    cache_creation_tokens: row.get(3)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Batch-fetch events by IDs.
    ///
    /// Returns a map of `event_id → EventRow`. Missing IDs are silently
    /// omitted.
    pub fn get_by_ids(
        conn: &Connection,
        event_ids: &[&str],
    ) -> Result<std::collections::HashMap<String, EventRow>> {
        let mut result = std::collections::HashMap::new();
        if event_ids.is_empty() {
            return Ok(result);
        }

        let placeholders: Vec<String> = (1..=event_ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {COLUMNS} FROM events WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = event_ids
            .iter()
            .map(|s| s as &dyn rusqlite::types::ToSql)
            .collect();
        let rows = stmt
            .query_map(params.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in rows {
            let _ = result.insert(row.id.clone(), row);
        }
        Ok(result)
    }

    /// Events of specific types within a session.
    pub fn get_by_types(
        conn: &Connection,
        session_id: &str,
        types: &[&str],
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        use std::fmt::Write;
        let placeholders: Vec<String> = (2..=types.len() + 1).map(|i| format!("?{i}")).collect();
        let mut sql = format!(
            "SELECT {COLUMNS} FROM events WHERE session_id = ?1 AND type IN ({}) ORDER BY sequence ASC",
            placeholders.join(", ")
        );
        if let Some(limit) = limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        params.push(Box::new(session_id.to_string()));
        for t in types {
            params.push(Box::new((*t).to_string()));
        }
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(Box::as_ref).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events by workspace and types (cross-session), newest first.
    pub fn get_by_workspace_and_types(
        conn: &Connection,
        workspace_id: &str,
        types: &[&str],
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        use std::fmt::Write;
        let placeholders: Vec<String> = (2..=types.len() + 1).map(|i| format!("?{i}")).collect();
        let mut sql = format!(
            "SELECT {COLUMNS} FROM events WHERE workspace_id = ?1 AND type IN ({}) ORDER BY timestamp DESC",
            placeholders.join(", ")
        );
        if let Some(limit) = limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        if let Some(offset) = offset {
            let _ = write!(sql, " OFFSET {offset}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        params.push(Box::new(workspace_id.to_string()));
        for t in types {
            params.push(Box::new((*t).to_string()));
        }
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(Box::as_ref).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count events by workspace and types.
    pub fn count_by_workspace_and_types(
        conn: &Connection,
        workspace_id: &str,
        types: &[&str],
    ) -> Result<i64> {
        if types.is_empty() {
            return Ok(0);
        }

        let placeholders: Vec<String> = (2..=types.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT COUNT(*) FROM events WHERE workspace_id = ?1 AND type IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        params.push(Box::new(workspace_id.to_string()));
        for t in types {
            params.push(Box::new((*t).to_string()));
        }
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(Box::as_ref).collect();

        let count: i64 = stmt.query_row(params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            workspace_id: row.get(2)?,
            parent_id: row.get(3)?,
            sequence: row.get(4)?,
            timestamp: row.get(5)?,
            event_type: row.get(6)?,
            payload: row.get(7)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
