//! Search repository — full-text search over event payloads.
//!
//! When the `events_fts` FTS5 table exists, queries are ranked with BM25 and
//! snippets are highlighted. When it is absent (engine built without FTS5),
//! search degrades to a LIKE substring scan over serialized payloads —
//! unranked and unreliable, but never an error.
//!
//! Indexing is done by the event writer (not triggers): the store calls
//! [`SearchRepo::index_event`] in the same transaction as the insert when
//! the table is present.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::errors::Result;
use crate::sqlite::migrations::fts_table_exists;
use crate::types::state::SearchResult;
use crate::types::{EventType, SessionEvent};

/// Hard cap on search result counts, shared with the ledger query API.
pub const SEARCH_LIMIT_CAP: i64 = 500;

/// Options for search queries.
#[derive(Default)]
pub struct SearchOptions<'a> {
    /// Filter by workspace.
    pub workspace_id: Option<&'a str>,
    /// Filter by session.
    pub session_id: Option<&'a str>,
    /// Filter by event types.
    pub types: Option<&'a [EventType]>,
    /// Maximum results (clamped to [`SEARCH_LIMIT_CAP`]).
    pub limit: Option<i64>,
}

fn effective_limit(limit: Option<i64>) -> i64 {
    limit.map_or(SEARCH_LIMIT_CAP, |l| l.clamp(1, SEARCH_LIMIT_CAP))
}

/// Search repository — stateless, every method takes `&Connection`.
pub struct SearchRepo;

impl SearchRepo {
    /// Search event payloads, ranked when FTS is available.
    pub fn search(
        conn: &Connection,
        query: &str,
        opts: &SearchOptions<'_>,
    ) -> Result<Vec<SearchResult>> {
        if fts_table_exists(conn)? {
            Self::search_fts(conn, query, opts)
        } else {
            Self::search_like(conn, query, opts)
        }
    }

    /// Search within a specific session.
    pub fn search_in_session(
        conn: &Connection,
        session_id: &str,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        Self::search(
            conn,
            query,
            &SearchOptions {
                session_id: Some(session_id),
                limit,
                ..Default::default()
            },
        )
    }

    /// Ranked FTS5 search with post-filters.
    fn search_fts(
        conn: &Connection,
        query: &str,
        opts: &SearchOptions<'_>,
    ) -> Result<Vec<SearchResult>> {
        use std::fmt::Write;
        let mut sql = String::from(
            "SELECT
               events_fts.id,
               events_fts.session_id,
               events_fts.type,
               snippet(events_fts, 3, '<mark>', '</mark>', '...', 64) AS snippet,
               bm25(events_fts) AS score,
               e.timestamp
             FROM events_fts
             JOIN events e ON events_fts.id = e.id
             WHERE events_fts MATCH ?1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(query.to_string()));

        if let Some(ws_id) = opts.workspace_id {
            let _ = write!(sql, " AND e.workspace_id = ?{}", param_values.len() + 1);
            param_values.push(Box::new(ws_id.to_string()));
        }
        if let Some(sess_id) = opts.session_id {
            let _ = write!(sql, " AND events_fts.session_id = ?{}", param_values.len() + 1);
            param_values.push(Box::new(sess_id.to_string()));
        }
        if let Some(types) = opts.types {
            if !types.is_empty() {
                let placeholders: Vec<String> = types
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("?{}", param_values.len() + i + 1))
                    .collect();
                let _ = write!(sql, " AND events_fts.type IN ({})", placeholders.join(", "));
                for t in types {
                    param_values.push(Box::new(t.to_string()));
                }
            }
        }

        sql.push_str(" ORDER BY score");
        let _ = write!(sql, " LIMIT {}", effective_limit(opts.limit));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_search_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Unranked LIKE substring scan over serialized payloads.
    fn search_like(
        conn: &Connection,
        query: &str,
        opts: &SearchOptions<'_>,
    ) -> Result<Vec<SearchResult>> {
        use std::fmt::Write;
        let mut sql = String::from(
            "SELECT id, session_id, type, timestamp, payload
             FROM events WHERE payload LIKE ?1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(format!("%{query}%")));

        if let Some(ws_id) = opts.workspace_id {
            let _ = write!(sql, " AND workspace_id = ?{}", param_values.len() + 1);
            param_values.push(Box::new(ws_id.to_string()));
        }
        if let Some(sess_id) = opts.session_id {
            let _ = write!(sql, " AND session_id = ?{}", param_values.len() + 1);
            param_values.push(Box::new(sess_id.to_string()));
        }
        if let Some(types) = opts.types {
            if !types.is_empty() {
                let placeholders: Vec<String> = types
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("?{}", param_values.len() + i + 1))
                    .collect();
                let _ = write!(sql, " AND type IN ({})", placeholders.join(", "));
                for t in types {
                    param_values.push(Box::new(t.to_string()));
                }
            }
        }

        sql.push_str(" ORDER BY timestamp DESC");
        let _ = write!(sql, " LIMIT {}", effective_limit(opts.limit));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let event_type: String = row.get(2)?;
                let payload: String = row.get(4)?;
                Ok(SearchResult {
                    event_id: row.get(0)?,
                    session_id: row.get(1)?,
                    event_type: EventType::from(event_type.as_str()),
                    timestamp: row.get(3)?,
                    snippet: excerpt(&payload),
                    score: 0.0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Index an event into `events_fts`. Caller guarantees the table exists.
    pub fn index_event(conn: &Connection, event: &SessionEvent) -> Result<()> {
        let content = extract_content(&event.payload);
        let tool_name = extract_tool_name(&event.payload);
        let _ = conn.execute(
            "INSERT INTO events_fts (id, session_id, type, content, tool_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.session_id,
                event.event_type.as_str(),
                content,
                tool_name,
            ],
        )?;
        Ok(())
    }

    /// Remove all of a session's events from the index.
    pub fn remove_by_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let changed = conn.execute(
            "DELETE FROM events_fts WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(changed)
    }

    /// Check if an event is indexed.
    pub fn is_indexed(conn: &Connection, event_id: &str) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM events_fts WHERE id = ?1",
                params![event_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Rebuild the FTS index for a session from the events table.
    ///
    /// Uses the same content extraction as [`index_event`](Self::index_event).
    /// Returns the number of events re-indexed.
    pub fn rebuild_session_index(conn: &Connection, session_id: &str) -> Result<usize> {
        let _ = Self::remove_by_session(conn, session_id)?;

        let mut stmt = conn.prepare(
            "SELECT id, session_id, type, payload
             FROM events WHERE session_id = ?1 ORDER BY sequence ASC",
        )?;
        let events: Vec<(String, String, String, String)> = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let count = events.len();
        for (id, sess_id, event_type, payload_str) in &events {
            let payload: Value = serde_json::from_str(payload_str).unwrap_or(Value::Null);
            let content = extract_content(&payload);
            let tool_name = extract_tool_name(&payload);
            let _ = conn.execute(
                "INSERT INTO events_fts (id, session_id, type, content, tool_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, sess_id, event_type, content, tool_name],
            )?;
        }

        Ok(count)
    }

    fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchResult> {
        let event_type: String = row.get(2)?;
        Ok(SearchResult {
            event_id: row.get(0)?,
            session_id: row.get(1)?,
            event_type: EventType::from(event_type.as_str()),
            snippet: row.get(3)?,
            score: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }
}

/// Extract searchable text from an event payload.
///
/// Ledger entries index their structured fields (title, input, actions,
/// lessons, tags); everything else indexes title and text content blocks.
fn extract_content(payload: &Value) -> String {
    if payload.get("actions").is_some() || payload.get("entryType").is_some() {
        return extract_ledger_content(payload);
    }

    let mut parts = Vec::new();
    if let Some(title) = payload.get("title").and_then(Value::as_str) {
        parts.push(title.to_string());
    }
    match payload.get("content") {
        Some(Value::String(s)) => parts.push(s.clone()),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("text") {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        parts.push(text.to_string());
                    }
                }
            }
        }
        _ => {}
    }
    if let Some(summary) = payload.get("summary").and_then(Value::as_str) {
        parts.push(summary.to_string());
    }
    parts.join(" ")
}

/// Extract searchable text from a `memory.ledger` payload.
fn extract_ledger_content(payload: &Value) -> String {
    let mut parts = Vec::new();

    for key in ["title", "entryType", "status", "input"] {
        if let Some(s) = payload.get(key).and_then(Value::as_str) {
            parts.push(s.to_string());
        }
    }
    for key in ["actions", "lessons", "tags"] {
        if let Some(arr) = payload.get(key).and_then(Value::as_array) {
            for item in arr {
                if let Some(s) = item.as_str() {
                    parts.push(s.to_string());
                }
            }
        }
    }
    if let Some(arr) = payload.get("files").and_then(Value::as_array) {
        for item in arr {
            for key in ["path", "why"] {
                if let Some(s) = item.get(key).and_then(Value::as_str) {
                    parts.push(s.to_string());
                }
            }
        }
    }

    parts.join(" ")
}

/// Extract tool name from a payload.
fn extract_tool_name(payload: &Value) -> String {
    payload
        .get("toolName")
        .or_else(|| payload.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Short content excerpt for LIKE-fallback snippets.
fn excerpt(payload_str: &str) -> String {
    let payload: Value = serde_json::from_str(payload_str).unwrap_or(Value::Null);
    let content = extract_content(&payload);
    let text = if content.is_empty() { payload_str } else { &content };
    let mut out: String = text.chars().take(160).collect();
    if out.len() < text.len() {
        out.push_str("...");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
