//! Workspace repository — CRUD for the `workspaces` table.
//!
//! Workspaces represent project directories. Each session belongs to a
//! workspace, and workspace paths are unique: two sessions in the same
//! directory share one workspace.

use rusqlite::{Connection, OptionalExtension, params};
use weave_core::{WorkspaceId, now_iso};

use crate::errors::Result;
use crate::sqlite::row_types::WorkspaceRow;

/// Options for creating a new workspace.
pub struct CreateWorkspaceOptions<'a> {
    /// Absolute filesystem path (must be unique).
    pub path: &'a str,
    /// Optional display name.
    pub name: Option<&'a str>,
}

/// Workspace repository — stateless, every method takes `&Connection`.
pub struct WorkspaceRepo;

impl WorkspaceRepo {
    /// Create a new workspace.
    pub fn create(conn: &Connection, opts: &CreateWorkspaceOptions<'_>) -> Result<WorkspaceRow> {
        let id = WorkspaceId::new().into_string();
        let now = now_iso();
        let _ = conn.execute(
            "INSERT INTO workspaces (id, path, name, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, opts.path, opts.name, now, now],
        )?;
        Ok(WorkspaceRow {
            id,
            path: opts.path.to_string(),
            name: opts.name.map(String::from),
            created_at: now.clone(),
            last_activity_at: now,
            session_count: Some(0),
        })
    }

    /// Get workspace by ID, with session count.
    pub fn get_by_id(conn: &Connection, workspace_id: &str) -> Result<Option<WorkspaceRow>> {
        let row = conn
            .query_row(
                "SELECT w.id, w.path, w.name, w.created_at, w.last_activity_at,
                        (SELECT COUNT(*) FROM sessions WHERE workspace_id = w.id) AS session_count
                 FROM workspaces w WHERE w.id = ?1",
                params![workspace_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get workspace by filesystem path, with session count.
    pub fn get_by_path(conn: &Connection, path: &str) -> Result<Option<WorkspaceRow>> {
        let row = conn
            .query_row(
                "SELECT w.id, w.path, w.name, w.created_at, w.last_activity_at,
                        (SELECT COUNT(*) FROM sessions WHERE workspace_id = w.id) AS session_count
                 FROM workspaces w WHERE w.path = ?1",
                params![path],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get existing workspace by path, or create a new one.
    pub fn get_or_create(conn: &Connection, path: &str, name: Option<&str>) -> Result<WorkspaceRow> {
        if let Some(ws) = Self::get_by_path(conn, path)? {
            return Ok(ws);
        }
        Self::create(conn, &CreateWorkspaceOptions { path, name })
    }

    /// List all workspaces ordered by last activity (most recent first).
    pub fn list(conn: &Connection) -> Result<Vec<WorkspaceRow>> {
        let mut stmt = conn.prepare(
            "SELECT w.id, w.path, w.name, w.created_at, w.last_activity_at,
                    (SELECT COUNT(*) FROM sessions WHERE workspace_id = w.id) AS session_count
             FROM workspaces w ORDER BY w.last_activity_at DESC",
        )?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update last activity timestamp to now.
    pub fn update_last_activity(conn: &Connection, workspace_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE workspaces SET last_activity_at = ?1 WHERE id = ?2",
            params![now_iso(), workspace_id],
        )?;
        Ok(changed > 0)
    }

    /// Update workspace name.
    pub fn update_name(conn: &Connection, workspace_id: &str, name: Option<&str>) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE workspaces SET name = ?1 WHERE id = ?2",
            params![name, workspace_id],
        )?;
        Ok(changed > 0)
    }

    /// Check if workspace exists.
    pub fn exists(conn: &Connection, workspace_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM workspaces WHERE id = ?1)",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkspaceRow> {
        Ok(WorkspaceRow {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            last_activity_at: row.get(4)?,
            session_count: row.get(5)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
