//! Session repository — session lifecycle and aggregate counters.
//!
//! Sessions are pointers into the event graph with denormalized counters
//! (event count, token usage, cost) for efficient list views. Counter
//! updates happen in the same transaction as the event insert that caused
//! them.

use rusqlite::{Connection, OptionalExtension, params};
use weave_core::{SessionId, now_iso};

use crate::errors::Result;
use crate::sqlite::row_types::SessionRow;

/// Options for inserting a new session row.
pub struct InsertSessionOptions<'a> {
    /// Workspace this session belongs to.
    pub workspace_id: &'a str,
    /// LLM model ID.
    pub model: &'a str,
    /// Working directory path.
    pub working_directory: &'a str,
    /// Optional title.
    pub title: Option<&'a str>,
    /// Optional tags.
    pub tags: Option<&'a [String]>,
    /// Parent session (for forks).
    pub parent_session_id: Option<&'a str>,
    /// Fork point event.
    pub fork_from_event_id: Option<&'a str>,
    /// Spawning session (for subsessions).
    pub spawning_session_id: Option<&'a str>,
    /// Spawn kind: subsession, tmux, or fork.
    pub spawn_type: Option<&'a str>,
    /// Spawn task description.
    pub spawn_task: Option<&'a str>,
}

/// Options for listing sessions.
#[derive(Default)]
pub struct ListSessionsOptions<'a> {
    /// Filter by workspace.
    pub workspace_id: Option<&'a str>,
    /// Filter by ended state.
    pub ended: Option<bool>,
    /// Exclude spawned (subsession) sessions.
    pub exclude_spawned: Option<bool>,
    /// Maximum results.
    pub limit: Option<i64>,
    /// Skip results.
    pub offset: Option<i64>,
}

/// Counters to apply atomically alongside an event insert.
#[derive(Default)]
pub struct IncrementCounters {
    /// Number of events to add.
    pub event_count: Option<i64>,
    /// Number of messages to add.
    pub message_count: Option<i64>,
    /// Input tokens to add.
    pub input_tokens: Option<i64>,
    /// Output tokens to add.
    pub output_tokens: Option<i64>,
    /// Cache read tokens to add.
    pub cache_read_tokens: Option<i64>,
    /// Cache creation tokens to add.
    pub cache_creation_tokens: Option<i64>,
    /// Set (not increment) the current context size.
    pub last_turn_input_tokens: Option<i64>,
    /// Cost to add.
    pub cost: Option<f64>,
}

/// Message preview for session list display.
#[derive(Clone, Debug, Default)]
pub struct MessagePreview {
    /// Last user prompt text.
    pub last_user_prompt: Option<String>,
    /// Last assistant response text.
    pub last_assistant_response: Option<String>,
}

/// Extract display text from a message event payload JSON string.
///
/// Handles both string content (`"content": "hello"`) and block-array
/// content (`"content": [{"type": "text", "text": "hello"}]`).
fn extract_text_from_payload(payload_str: &str) -> String {
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(payload_str) else {
        return String::new();
    };
    match payload.get("content") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(arr)) => {
            let mut texts = Vec::new();
            for block in arr {
                if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        texts.push(text);
                    }
                }
            }
            texts.join("")
        }
        _ => String::new(),
    }
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session row.
    pub fn create(conn: &Connection, opts: &InsertSessionOptions<'_>) -> Result<SessionRow> {
        let id = SessionId::new().into_string();
        let now = now_iso();
        let tags_json = opts.tags.map_or_else(
            || "[]".to_string(),
            |t| serde_json::to_string(t).unwrap_or_else(|_| "[]".to_string()),
        );

        let _ = conn.execute(
            "INSERT INTO sessions (id, workspace_id, working_directory, latest_model, title, tags,
             parent_session_id, fork_from_event_id, spawning_session_id, spawn_type, spawn_task,
             created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id,
                opts.workspace_id,
                opts.working_directory,
                opts.model,
                opts.title,
                tags_json,
                opts.parent_session_id,
                opts.fork_from_event_id,
                opts.spawning_session_id,
                opts.spawn_type,
                opts.spawn_task,
                now,
                now,
            ],
        )?;

        Ok(SessionRow {
            id,
            workspace_id: opts.workspace_id.to_string(),
            working_directory: opts.working_directory.to_string(),
            latest_model: opts.model.to_string(),
            title: opts.title.map(String::from),
            tags: tags_json,
            root_event_id: None,
            head_event_id: None,
            parent_session_id: opts.parent_session_id.map(String::from),
            fork_from_event_id: opts.fork_from_event_id.map(String::from),
            spawning_session_id: opts.spawning_session_id.map(String::from),
            spawn_type: opts.spawn_type.map(String::from),
            spawn_task: opts.spawn_task.map(String::from),
            event_count: 0,
            message_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
            last_turn_input_tokens: 0,
            total_cost: 0.0,
            ended_at: None,
            created_at: now.clone(),
            last_activity_at: now,
        })
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List sessions with filtering, most recently active first.
    pub fn list(conn: &Connection, opts: &ListSessionsOptions<'_>) -> Result<Vec<SessionRow>> {
        use std::fmt::Write;
        let mut sql = String::from("SELECT * FROM sessions WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ws_id) = opts.workspace_id {
            let _ = write!(sql, " AND workspace_id = ?{}", param_values.len() + 1);
            param_values.push(Box::new(ws_id.to_string()));
        }
        if let Some(ended) = opts.ended {
            if ended {
                sql.push_str(" AND ended_at IS NOT NULL");
            } else {
                sql.push_str(" AND ended_at IS NULL");
            }
        }
        if opts.exclude_spawned == Some(true) {
            sql.push_str(" AND spawning_session_id IS NULL");
        }
        sql.push_str(" ORDER BY last_activity_at DESC");
        if let Some(limit) = opts.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        if let Some(offset) = opts.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update head event ID and last activity.
    pub fn update_head(conn: &Connection, session_id: &str, head_event_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET head_event_id = ?1, last_activity_at = ?2 WHERE id = ?3",
            params![head_event_id, now_iso(), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Update root event ID. Set exactly once, right after the first insert.
    pub fn update_root(conn: &Connection, session_id: &str, root_event_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET root_event_id = ?1 WHERE id = ?2 AND root_event_id IS NULL",
            params![root_event_id, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark session as ended.
    pub fn mark_ended(conn: &Connection, session_id: &str) -> Result<bool> {
        let now = now_iso();
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?1, last_activity_at = ?2 WHERE id = ?3",
            params![now, now, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Clear ended status (reactivate session).
    pub fn clear_ended(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = NULL, last_activity_at = ?1 WHERE id = ?2",
            params![now_iso(), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Update the latest model used.
    pub fn update_latest_model(conn: &Connection, session_id: &str, model: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET latest_model = ?1, last_activity_at = ?2 WHERE id = ?3",
            params![model, now_iso(), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Update session title.
    pub fn update_title(conn: &Connection, session_id: &str, title: Option<&str>) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET title = ?1 WHERE id = ?2",
            params![title, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Update spawn linkage (ties a session to the session that launched it).
    pub fn update_spawn_info(
        conn: &Connection,
        session_id: &str,
        spawning_session_id: &str,
        spawn_type: &str,
        spawn_task: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET spawning_session_id = ?1, spawn_type = ?2, spawn_task = ?3 WHERE id = ?4",
            params![spawning_session_id, spawn_type, spawn_task, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Apply denormalized counter deltas atomically.
    pub fn increment_counters(
        conn: &Connection,
        session_id: &str,
        counters: &IncrementCounters,
    ) -> Result<bool> {
        let mut updates = Vec::new();

        if let Some(v) = counters.event_count {
            updates.push(format!("event_count = event_count + {v}"));
        }
        if let Some(v) = counters.message_count {
            updates.push(format!("message_count = message_count + {v}"));
        }
        if let Some(v) = counters.input_tokens {
            updates.push(format!("input_tokens = input_tokens + {v}"));
        }
        if let Some(v) = counters.output_tokens {
            updates.push(format!("output_tokens = output_tokens + {v}"));
        }
        if let Some(v) = counters.cache_read_tokens {
            updates.push(format!("cache_read_tokens = cache_read_tokens + {v}"));
        }
        if let Some(v) = counters.cache_creation_tokens {
            updates.push(format!(
                "cache_creation_tokens = cache_creation_tokens + {v}"
            ));
        }
        if let Some(v) = counters.last_turn_input_tokens {
            updates.push(format!("last_turn_input_tokens = {v}"));
        }
        if let Some(v) = counters.cost {
            updates.push(format!("total_cost = total_cost + {v}"));
        }

        if updates.is_empty() {
            return Ok(false);
        }

        updates.push(format!("last_activity_at = '{}'", now_iso()));

        let sql = format!("UPDATE sessions SET {} WHERE id = ?1", updates.join(", "));
        let changed = conn.execute(&sql, params![session_id])?;
        Ok(changed > 0)
    }

    /// Check if session exists.
    pub fn exists(conn: &Connection, session_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Delete a session row.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(changed > 0)
    }

    /// Batch-fetch sessions by IDs.
    ///
    /// Returns a map of `session_id → SessionRow`. Missing IDs are silently
    /// omitted.
    pub fn get_by_ids(
        conn: &Connection,
        session_ids: &[&str],
    ) -> Result<std::collections::HashMap<String, SessionRow>> {
        let mut result = std::collections::HashMap::new();
        if session_ids.is_empty() {
            return Ok(result);
        }

        let placeholders: Vec<String> = (1..=session_ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT * FROM sessions WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = session_ids
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

    /// Get message previews (last user prompt and assistant response) for a
    /// list of sessions, using a window function to find the most recent
    /// message of each type per session.
    pub fn get_message_previews(
        conn: &Connection,
        session_ids: &[&str],
    ) -> Result<std::collections::HashMap<String, MessagePreview>> {
        let mut result = std::collections::HashMap::new();
        if session_ids.is_empty() {
            return Ok(result);
        }

        for &sid in session_ids {
            let _ = result.insert(sid.to_string(), MessagePreview::default());
        }

        let placeholders: Vec<String> = (1..=session_ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "WITH ranked AS (
               SELECT
                 session_id,
                 type,
                 payload,
                 ROW_NUMBER() OVER (PARTITION BY session_id, type ORDER BY sequence DESC) AS rn
               FROM events
               WHERE session_id IN ({})
                 AND type IN ('message.user', 'message.assistant')
             )
             SELECT session_id, type, payload
             FROM ranked
             WHERE rn = 1",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = session_ids
            .iter()
            .map(|s| s as &dyn rusqlite::types::ToSql)
            .collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (session_id, event_type, payload_str) in rows {
            let text = extract_text_from_payload(&payload_str);
            if let Some(preview) = result.get_mut(&session_id) {
                match event_type.as_str() {
                    "message.user" => preview.last_user_prompt = Some(text),
                    "message.assistant" => preview.last_assistant_response = Some(text),
                    _ => {}
                }
            }
        }

        Ok(result)
    }

    /// List sessions spawned by a parent session.
    pub fn list_spawned(conn: &Connection, spawning_session_id: &str) -> Result<Vec<SessionRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions WHERE spawning_session_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![spawning_session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            workspace_id: row.get("workspace_id")?,
            working_directory: row.get("working_directory")?,
            latest_model: row.get("latest_model")?,
            title: row.get("title")?,
            tags: row.get("tags")?,
            root_event_id: row.get("root_event_id")?,
            head_event_id: row.get("head_event_id")?,
            parent_session_id: row.get("parent_session_id")?,
            fork_from_event_id: row.get("fork_from_event_id")?,
            spawning_session_id: row.get("spawning_session_id")?,
            spawn_type: row.get("spawn_type")?,
            spawn_task: row.get("spawn_task")?,
            event_count: row.get("event_count")?,
            message_count: row.get("message_count")?,
            input_tokens: row.get("input_tokens")?,
            output_tokens: row.get("output_tokens")?,
            cache_read_tokens: row.get("cache_read_tokens")?,
            cache_creation_tokens: row.get("cache_creation_tokens")?,
            last_turn_input_tokens: row.get("last_turn_input_tokens")?,
            total_cost: row.get("total_cost")?,
            ended_at: row.get("ended_at")?,
            created_at: row.get("created_at")?,
            last_activity_at: row.get("last_activity_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use crate::sqlite::repositories::workspace::{CreateWorkspaceOptions, WorkspaceRepo};

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        let ws = WorkspaceRepo::create(
            &conn,
            &CreateWorkspaceOptions {
                path: "/tmp/test",
                name: None,
            },
        )
        .unwrap();
        (conn, ws.id)
    }

    fn create_default_session(conn: &Connection, ws_id: &str) -> SessionRow {
        SessionRepo::create(
            conn,
            &InsertSessionOptions {
                workspace_id: ws_id,
                model: "claude-opus-4-6",
                working_directory: "/tmp/test",
                title: Some("Test Session"),
                tags: None,
                parent_session_id: None,
                fork_from_event_id: None,
                spawning_session_id: None,
                spawn_type: None,
                spawn_task: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_session() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);

        assert!(sess.id.starts_with("sess_"));
        assert_eq!(sess.workspace_id, ws_id);
        assert_eq!(sess.latest_model, "claude-opus-4-6");
        assert_eq!(sess.title.as_deref(), Some("Test Session"));
        assert_eq!(sess.event_count, 0);
        assert!(sess.ended_at.is_none());
    }

    #[test]
    fn get_by_id_not_found() {
        let (conn, _) = setup();
        assert!(SessionRepo::get_by_id(&conn, "sess_nonexistent").unwrap().is_none());
    }

    #[test]
    fn list_by_workspace() {
        let (conn, ws_id) = setup();
        create_default_session(&conn, &ws_id);

        let ws2 = WorkspaceRepo::create(
            &conn,
            &CreateWorkspaceOptions {
                path: "/tmp/other",
                name: None,
            },
        )
        .unwrap();
        SessionRepo::create(
            &conn,
            &InsertSessionOptions {
                workspace_id: &ws2.id,
                model: "claude-opus-4-6",
                working_directory: "/tmp/other",
                title: None,
                tags: None,
                parent_session_id: None,
                fork_from_event_id: None,
                spawning_session_id: None,
                spawn_type: None,
                spawn_task: None,
            },
        )
        .unwrap();

        let filtered = SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                workspace_id: Some(&ws_id),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].workspace_id, ws_id);
    }

    #[test]
    fn list_filters_ended() {
        let (conn, ws_id) = setup();
        let a = create_default_session(&conn, &ws_id);
        let _b = create_default_session(&conn, &ws_id);
        SessionRepo::mark_ended(&conn, &a.id).unwrap();

        let active = SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                ended: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(active.len(), 1);

        let ended = SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                ended: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].id, a.id);
    }

    #[test]
    fn update_root_only_sets_once() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);

        assert!(SessionRepo::update_root(&conn, &sess.id, "evt_first").unwrap());
        assert!(!SessionRepo::update_root(&conn, &sess.id, "evt_second").unwrap());

        let found = SessionRepo::get_by_id(&conn, &sess.id).unwrap().unwrap();
        assert_eq!(found.root_event_id.as_deref(), Some("evt_first"));
    }

    #[test]
    fn mark_and_clear_ended() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);

        assert!(SessionRepo::mark_ended(&conn, &sess.id).unwrap());
        let ended = SessionRepo::get_by_id(&conn, &sess.id).unwrap().unwrap();
        assert!(ended.ended_at.is_some());

        assert!(SessionRepo::clear_ended(&conn, &sess.id).unwrap());
        let active = SessionRepo::get_by_id(&conn, &sess.id).unwrap().unwrap();
        assert!(active.ended_at.is_none());
    }

    #[test]
    fn increment_counters_accumulates() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);

        SessionRepo::increment_counters(
            &conn,
            &sess.id,
            &IncrementCounters {
                event_count: Some(1),
                message_count: Some(1),
                input_tokens: Some(100),
                output_tokens: Some(50),
                cache_read_tokens: Some(10),
                cost: Some(0.25),
                ..Default::default()
            },
        )
        .unwrap();
        SessionRepo::increment_counters(
            &conn,
            &sess.id,
            &IncrementCounters {
                event_count: Some(1),
                input_tokens: Some(200),
                last_turn_input_tokens: Some(300),
                cost: Some(0.5),
                ..Default::default()
            },
        )
        .unwrap();

        let found = SessionRepo::get_by_id(&conn, &sess.id).unwrap().unwrap();
        assert_eq!(found.event_count, 2);
        assert_eq!(found.message_count, 1);
        assert_eq!(found.input_tokens, 300);
        assert_eq!(found.output_tokens, 50);
        assert_eq!(found.cache_read_tokens, 10);
        assert_eq!(found.last_turn_input_tokens, 300);
        assert!((found.total_cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn increment_counters_empty_is_noop() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);
        let changed =
            SessionRepo::increment_counters(&conn, &sess.id, &IncrementCounters::default())
                .unwrap();
        assert!(!changed);
    }

    #[test]
    fn last_turn_input_tokens_is_set_not_added() {
        let (conn, ws_id) = setup();
        let sess = create_default_session(&conn, &ws_id);

        for v in [1000, 4000, 2500] {
            SessionRepo::increment_counters(
                &conn,
                &sess.id,
                &IncrementCounters {
                    last_turn_input_tokens: Some(v),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let found = SessionRepo::get_by_id(&conn, &sess.id).unwrap().unwrap();
        assert_eq!(found.last_turn_input_tokens, 2500);
    }

    #[test]
    fn get_by_ids_batch() {
        let (conn, ws_id) = setup();
        let a = create_default_session(&conn, &ws_id);
        let b = create_default_session(&conn, &ws_id);

        let ids = [a.id.as_str(), b.id.as_str(), "sess_missing"];
        let map = SessionRepo::get_by_ids(&conn, &ids).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&a.id));
        assert!(map.contains_key(&b.id));
    }

    #[test]
    fn spawn_info_roundtrip() {
        let (conn, ws_id) = setup();
        let parent = create_default_session(&conn, &ws_id);
        let child = create_default_session(&conn, &ws_id);

        SessionRepo::update_spawn_info(&conn, &child.id, &parent.id, "subsession", "fix the tests")
            .unwrap();

        let spawned = SessionRepo::list_spawned(&conn, &parent.id).unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].id, child.id);
        assert_eq!(spawned[0].spawn_type.as_deref(), Some("subsession"));
        assert_eq!(spawned[0].spawn_task.as_deref(), Some("fix the tests"));
    }

    #[test]
    fn exclude_spawned_filter() {
        let (conn, ws_id) = setup();
        let parent = create_default_session(&conn, &ws_id);
        let child = create_default_session(&conn, &ws_id);
        SessionRepo::update_spawn_info(&conn, &child.id, &parent.id, "subsession", "task").unwrap();

        let top_level = SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                exclude_spawned: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(top_level.len(), 1);
        assert_eq!(top_level[0].id, parent.id);
    }

    #[test]
    fn extract_text_handles_both_content_shapes() {
        assert_eq!(
            extract_text_from_payload(r#"{"content": "plain"}"#),
            "plain"
        );
        assert_eq!(
            extract_text_from_payload(
                r#"{"content": [{"type": "text", "text": "a"}, {"type": "tool_use", "id": "t"}, {"type": "text", "text": "b"}]}"#
            ),
            "ab"
        );
        assert_eq!(extract_text_from_payload("not json"), "");
    }
}
