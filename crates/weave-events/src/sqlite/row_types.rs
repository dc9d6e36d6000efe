//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape — not the public wire types.
//! Conversion to reconstruction inputs happens in the store layer.

use serde::{Deserialize, Serialize};

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID.
    pub id: String,
    /// Workspace ID.
    pub workspace_id: String,
    /// Working directory.
    pub working_directory: String,
    /// Latest model ID.
    pub latest_model: String,
    /// Session title.
    pub title: Option<String>,
    /// Tags as a JSON array string.
    pub tags: String,
    /// Root event ID (set once, immediately after the first event).
    pub root_event_id: Option<String>,
    /// Head event ID (the most recently appended event).
    pub head_event_id: Option<String>,
    /// Parent session ID (for forks).
    pub parent_session_id: Option<String>,
    /// Fork point event ID.
    pub fork_from_event_id: Option<String>,
    /// Spawning session ID (for subsessions).
    pub spawning_session_id: Option<String>,
    /// Spawn kind: subsession, tmux, or fork.
    pub spawn_type: Option<String>,
    /// Spawn task description.
    pub spawn_task: Option<String>,
    /// Event count.
    pub event_count: i64,
    /// Message count (user + assistant events).
    pub message_count: i64,
    /// Cumulative input tokens.
    pub input_tokens: i64,
    /// Cumulative output tokens.
    pub output_tokens: i64,
    /// Cumulative cache read tokens.
    pub cache_read_tokens: i64,
    /// Cumulative cache creation tokens.
    pub cache_creation_tokens: i64,
    /// Current context size after the last token-bearing turn.
    pub last_turn_input_tokens: i64,
    /// Total cost in USD.
    pub total_cost: f64,
    /// End timestamp (null while active).
    pub ended_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last activity timestamp.
    pub last_activity_at: String,
}

/// Raw event row from the `events` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRow {
    /// Event ID.
    pub id: String,
    /// Session ID.
    pub session_id: String,
    /// Workspace ID.
    pub workspace_id: String,
    /// Parent event ID (`None` only for session roots).
    pub parent_id: Option<String>,
    /// Sequence number within the session.
    pub sequence: i64,
    /// Timestamp.
    pub timestamp: String,
    /// Event type string.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Payload JSON string.
    pub payload: String,
}

/// Raw workspace row from the `workspaces` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceRow {
    /// Workspace ID.
    pub id: String,
    /// Absolute path (unique natural key).
    pub path: String,
    /// Display name.
    pub name: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last activity timestamp.
    pub last_activity_at: String,
    /// Session count (computed via subquery on reads).
    pub session_count: Option<i64>,
}

/// Raw blob row from the `blobs` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobRow {
    /// Blob ID.
    pub id: String,
    /// Content hash (SHA-256 hex).
    pub hash: String,
    /// Blob content.
    pub content: Vec<u8>,
    /// MIME type.
    pub mime_type: String,
    /// Original content size in bytes.
    pub size_original: i64,
    /// Stored content size in bytes.
    pub size_compressed: i64,
    /// Compression codec tag (`none` when stored raw).
    pub compression: String,
    /// Reference count.
    pub ref_count: i64,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw log row from the `logs` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRow {
    /// Auto-assigned row ID.
    pub id: i64,
    /// Session the record belongs to, when known.
    pub session_id: Option<String>,
    /// Timestamp.
    pub timestamp: String,
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
