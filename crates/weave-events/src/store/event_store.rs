//! High-level transactional `EventStore` API.
//!
//! Composes all repository operations into atomic, session-centric methods.
//! Every write method runs inside a single `SQLite` transaction — callers
//! never observe partial state.
//!
//! INVARIANT: session writes are serialized per-session via in-process mutex
//! locks (`with_session_write_lock`). Global mutations (workspace and blob
//! creation, forks) use a separate global lock. The database-level
//! `UNIQUE(session_id, sequence)` index backstops ordering.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use weave_core::{EventId, now_iso};

use crate::errors::{EventStoreError, Result};
use crate::pricing;
use crate::reconstruct::{ReconstructionResult, reconstruct_from_events};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::{current_version, ensure_fts_table, run_migrations};
use crate::sqlite::repositories::blob::{BlobRepo, BlobSizeInfo, StoreBlobResult};
use crate::sqlite::repositories::event::{EventRepo, ListEventsOptions, TokenUsageSummary};
use crate::sqlite::repositories::log::{LogRepo, NewLogRecord};
use crate::sqlite::repositories::search::{SearchOptions, SearchRepo};
use crate::sqlite::repositories::session::{
    IncrementCounters, InsertSessionOptions, ListSessionsOptions, MessagePreview, SessionRepo,
};
use crate::sqlite::repositories::workspace::WorkspaceRepo;
use crate::sqlite::row_types::{BlobRow, EventRow, LogRow, SessionRow, WorkspaceRow};
use crate::types::base::SessionEvent;
use crate::types::payloads::message_ops::MessageDeletedPayload;
use crate::types::payloads::session::{SessionForkPayload, SessionStartPayload};
use crate::types::state::{SearchResult, SessionState};
use crate::types::{DeleteReason, EventType, TokenUsage};

/// Options for creating a session.
#[derive(Debug)]
pub struct CreateSessionOptions<'a> {
    /// Workspace path (natural key; the workspace is created on demand).
    pub workspace_path: &'a str,
    /// LLM model ID.
    pub model: &'a str,
    /// Working directory; defaults to the workspace path.
    pub working_directory: Option<&'a str>,
    /// Session title.
    pub title: Option<&'a str>,
    /// Provider name; inferred from the model prefix when absent.
    pub provider: Option<&'a str>,
    /// System prompt recorded on the root event.
    pub system_prompt: Option<&'a str>,
    /// Client kind that opened the session.
    pub client_type: Option<&'a str>,
    /// Client version string.
    pub version: Option<&'a str>,
    /// Free-form client metadata.
    pub metadata: Option<Value>,
    /// Session tags.
    pub tags: Option<&'a [String]>,
}

impl<'a> CreateSessionOptions<'a> {
    /// Options with just the required fields set.
    pub fn new(workspace_path: &'a str, model: &'a str) -> Self {
        Self {
            workspace_path,
            model,
            working_directory: None,
            title: None,
            provider: None,
            system_prompt: None,
            client_type: None,
            version: None,
            metadata: None,
            tags: None,
        }
    }
}

/// Result of creating a new session.
#[derive(Debug)]
pub struct CreateSessionResult {
    /// The created session.
    pub session: SessionRow,
    /// The root `session.start` event.
    pub root_event: EventRow,
}

/// Result of forking a session.
#[derive(Debug)]
pub struct ForkResult {
    /// The newly created (forked) session.
    pub session: SessionRow,
    /// The root `session.fork` event.
    pub fork_event: EventRow,
}

/// Options for appending an event.
pub struct AppendOptions<'a> {
    /// Session to append to.
    pub session_id: &'a str,
    /// Event type.
    pub event_type: EventType,
    /// Event payload (must be a JSON object).
    pub payload: Value,
    /// Explicit parent. If `None`, chains from the session head. The
    /// linearized queue always passes its pending head here.
    pub parent_id: Option<&'a str>,
}

/// Options for forking a session.
#[derive(Default)]
pub struct ForkOptions<'a> {
    /// Fork name; recorded in the fork payload and used as the new title.
    pub name: Option<&'a str>,
    /// Model override for the fork; defaults to the source session's model.
    pub model: Option<&'a str>,
}

/// High-level `EventStore` wrapping a connection pool and all repositories.
pub struct EventStore {
    pool: ConnectionPool,
    fts_enabled: bool,
    global_write_lock: Mutex<()>,
    session_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl EventStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

    /// Open a file-backed store, running migrations and creating the FTS
    /// table (best-effort).
    pub fn open_file(path: &str, config: &ConnectionConfig) -> Result<Self> {
        Self::initialize(connection::new_file(path, config)?)
    }

    /// Open an in-memory store (for tests).
    pub fn open_in_memory(config: &ConnectionConfig) -> Result<Self> {
        Self::initialize(connection::new_in_memory(config)?)
    }

    fn initialize(pool: ConnectionPool) -> Result<Self> {
        let fts_enabled = {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
            ensure_fts_table(&conn)
        };
        Ok(Self {
            pool,
            fts_enabled,
            global_write_lock: Mutex::new(()),
            session_write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Current schema version.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        current_version(&conn)
    }

    /// Whether ranked full-text search is available.
    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    /// The raw connection pool (for advanced/custom queries).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────
    // Locking and retry
    // ─────────────────────────────────────────────────────────────────────

    fn lock_global_write(&self) -> Result<MutexGuard<'_, ()>> {
        self.global_write_lock
            .lock()
            .map_err(|_| EventStoreError::Internal("global write lock poisoned".into()))
    }

    fn acquire_session_write_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| EventStoreError::Internal("session lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_session_write_lock<T>(
        &self,
        session_id: &str,
        f: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let session_lock = self.acquire_session_write_lock(session_id)?;
        let _guard = session_lock
            .lock()
            .map_err(|_| EventStoreError::Internal("session write lock poisoned".into()))?;
        self.retry_on_sqlite_busy(f)
    }

    fn with_global_write_lock<T>(&self, f: impl FnMut() -> Result<T>) -> Result<T> {
        let _guard = self.lock_global_write()?;
        self.retry_on_sqlite_busy(f)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff + jitter.
    ///
    /// Backoff: base = min(attempts * 10, 500) ms, jitter ±25%.
    #[allow(clippy::unused_self)]
    fn retry_on_sqlite_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &EventStoreError) -> bool {
        match err {
            EventStoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    fn remove_session_write_lock(&self, session_id: &str) -> Result<()> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| EventStoreError::Internal("session lock map poisoned".into()))?;
        let _ = locks.remove(session_id);
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new session with a root `session.start` event.
    ///
    /// Atomic: workspace get-or-create, session insertion, root event
    /// insertion, head/root pointer updates, and counter increments all
    /// happen in one transaction.
    #[instrument(skip(self, opts), fields(model = opts.model, workspace_path = opts.workspace_path))]
    pub fn create_session(&self, opts: &CreateSessionOptions<'_>) -> Result<CreateSessionResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            let ws = WorkspaceRepo::get_or_create(&tx, opts.workspace_path, None)?;
            let working_directory = opts.working_directory.unwrap_or(opts.workspace_path);

            let session = SessionRepo::create(
                &tx,
                &InsertSessionOptions {
                    workspace_id: &ws.id,
                    model: opts.model,
                    working_directory,
                    title: opts.title,
                    tags: opts.tags,
                    parent_session_id: None,
                    fork_from_event_id: None,
                    spawning_session_id: None,
                    spawn_type: None,
                    spawn_task: None,
                },
            )?;

            let provider = opts
                .provider
                .map_or_else(|| infer_provider(opts.model), String::from);
            let payload = serde_json::to_value(SessionStartPayload {
                working_directory: working_directory.to_string(),
                model: opts.model.to_string(),
                provider: Some(provider),
                title: opts.title.map(String::from),
                system_prompt: opts.system_prompt.map(String::from),
                client_type: opts.client_type.map(String::from),
                version: opts.version.map(String::from),
                metadata: opts.metadata.clone(),
            })?;

            let event = SessionEvent {
                id: EventId::new().into_string(),
                parent_id: None,
                session_id: session.id.clone(),
                workspace_id: ws.id.clone(),
                timestamp: now_iso(),
                event_type: EventType::SessionStart,
                sequence: 0,
                payload,
            };
            EventRepo::insert(&tx, &event)?;
            if self.fts_enabled {
                SearchRepo::index_event(&tx, &event)?;
            }

            let _ = SessionRepo::update_root(&tx, &session.id, &event.id)?;
            let _ = SessionRepo::update_head(&tx, &session.id, &event.id)?;
            let _ = SessionRepo::increment_counters(
                &tx,
                &session.id,
                &IncrementCounters {
                    event_count: Some(1),
                    ..Default::default()
                },
            )?;

            tx.commit()?;
            metrics::counter!("weave_sessions_created_total").increment(1);

            let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
                .ok_or(EventStoreError::SessionNotFound(session.id))?;
            let root_event = EventRepo::get_by_id(&conn, &event.id)?
                .ok_or(EventStoreError::EventNotFound(event.id.clone()))?;

            debug!(session_id = %updated_session.id, "session created");

            Ok(CreateSessionResult {
                session: updated_session,
                root_event,
            })
        })
    }

    /// Append an event to a session.
    ///
    /// Atomic: sequence claim, event insertion, FTS indexing, head update,
    /// and counter increments all happen in one transaction.
    #[instrument(skip(self, opts), fields(session_id = opts.session_id, event_type = %opts.event_type))]
    pub fn append(&self, opts: &AppendOptions<'_>) -> Result<EventRow> {
        self.with_session_write_lock(opts.session_id, || self.append_inner(opts))
    }

    /// Inner append without acquiring the write lock. Called by `append`
    /// (which holds the lock) and by `delete_message` (which acquires the
    /// lock once at its own level).
    fn append_inner(&self, opts: &AppendOptions<'_>) -> Result<EventRow> {
        if !opts.payload.is_object() {
            return Err(EventStoreError::InvalidOperation(
                "event payload must be a JSON object".into(),
            ));
        }
        let started = Instant::now();

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let session = SessionRepo::get_by_id(&tx, opts.session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(opts.session_id.to_string()))?;

        let parent_id = match opts.parent_id {
            Some(pid) => Some(pid.to_string()),
            None => session.head_event_id.clone(),
        };

        let sequence = EventRepo::get_next_sequence(&tx, opts.session_id)?;

        let event = SessionEvent {
            id: EventId::new().into_string(),
            parent_id,
            session_id: opts.session_id.to_string(),
            workspace_id: session.workspace_id.clone(),
            timestamp: now_iso(),
            event_type: opts.event_type.clone(),
            sequence,
            payload: opts.payload.clone(),
        };
        EventRepo::insert(&tx, &event)?;
        if self.fts_enabled {
            SearchRepo::index_event(&tx, &event)?;
        }

        let _ = SessionRepo::update_head(&tx, opts.session_id, &event.id)?;
        if session.root_event_id.is_none() {
            let _ = SessionRepo::update_root(&tx, opts.session_id, &event.id)?;
        }

        let counters = build_counters(&opts.event_type, &opts.payload, &session.latest_model);
        let _ = SessionRepo::increment_counters(&tx, opts.session_id, &counters)?;

        tx.commit()?;

        metrics::counter!("weave_events_appended_total", "type" => opts.event_type.to_string())
            .increment(1);
        metrics::histogram!("weave_event_append_seconds").record(started.elapsed().as_secs_f64());

        let inserted = EventRepo::get_by_id(&conn, &event.id)?
            .ok_or(EventStoreError::EventNotFound(event.id.clone()))?;
        Ok(inserted)
    }

    /// Fork a session from a specific event.
    ///
    /// Creates a new session whose root `session.fork` event points its
    /// `parent_id` into the source session's event graph; ancestor walks
    /// from the fork traverse the shared history. Atomic: the session row
    /// and its fork event both exist, or neither does.
    #[instrument(skip(self, opts), fields(from_event_id))]
    pub fn fork(&self, from_event_id: &str, opts: &ForkOptions<'_>) -> Result<ForkResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            let source_event = EventRepo::get_by_id(&tx, from_event_id)?
                .ok_or_else(|| EventStoreError::EventNotFound(from_event_id.to_string()))?;
            let source_session = SessionRepo::get_by_id(&tx, &source_event.session_id)?
                .ok_or_else(|| EventStoreError::SessionNotFound(source_event.session_id.clone()))?;

            let model = opts.model.unwrap_or(&source_session.latest_model);
            let session = SessionRepo::create(
                &tx,
                &InsertSessionOptions {
                    workspace_id: &source_session.workspace_id,
                    model,
                    working_directory: &source_session.working_directory,
                    title: opts.name,
                    tags: None,
                    parent_session_id: Some(&source_session.id),
                    fork_from_event_id: Some(from_event_id),
                    spawning_session_id: None,
                    spawn_type: None,
                    spawn_task: None,
                },
            )?;

            let payload = serde_json::to_value(SessionForkPayload {
                source_session_id: source_session.id.clone(),
                source_event_id: from_event_id.to_string(),
                name: opts.name.map(String::from),
            })?;

            let fork_event = SessionEvent {
                id: EventId::new().into_string(),
                parent_id: Some(from_event_id.to_string()),
                session_id: session.id.clone(),
                workspace_id: source_session.workspace_id.clone(),
                timestamp: now_iso(),
                event_type: EventType::SessionFork,
                sequence: 0,
                payload,
            };
            EventRepo::insert(&tx, &fork_event)?;
            if self.fts_enabled {
                SearchRepo::index_event(&tx, &fork_event)?;
            }

            let _ = SessionRepo::update_root(&tx, &session.id, &fork_event.id)?;
            let _ = SessionRepo::update_head(&tx, &session.id, &fork_event.id)?;
            let _ = SessionRepo::increment_counters(
                &tx,
                &session.id,
                &IncrementCounters {
                    event_count: Some(1),
                    ..Default::default()
                },
            )?;

            tx.commit()?;
            metrics::counter!("weave_sessions_forked_total").increment(1);

            let updated_session = SessionRepo::get_by_id(&conn, &session.id)?
                .ok_or(EventStoreError::SessionNotFound(session.id))?;
            let fork_event_row = EventRepo::get_by_id(&conn, &fork_event.id)?
                .ok_or(EventStoreError::EventNotFound(fork_event.id.clone()))?;

            debug!(
                new_session_id = %updated_session.id,
                source_session_id = %source_session.id,
                "session forked"
            );

            Ok(ForkResult {
                session: updated_session,
                fork_event: fork_event_row,
            })
        })
    }

    /// Delete a message by appending a `message.deleted` tombstone.
    ///
    /// The target must be a `message.user`, `message.assistant`, or
    /// `tool.result` event. The original row is never modified — deletion is
    /// applied during reconstruction.
    #[instrument(skip(self), fields(session_id, target_event_id))]
    pub fn delete_message(
        &self,
        session_id: &str,
        target_event_id: &str,
        reason: Option<DeleteReason>,
    ) -> Result<EventRow> {
        self.with_session_write_lock(session_id, || {
            let payload =
                self.deletion_payload(session_id, target_event_id, reason.unwrap_or_default())?;
            self.append_inner(&AppendOptions {
                session_id,
                event_type: EventType::MessageDeleted,
                payload,
                parent_id: None,
            })
        })
    }

    /// Validate a deletion target and build the tombstone payload.
    ///
    /// Shared by the synchronous path above and the linearized queue.
    pub fn deletion_payload(
        &self,
        session_id: &str,
        target_event_id: &str,
        reason: DeleteReason,
    ) -> Result<Value> {
        let conn = self.conn()?;
        let target = EventRepo::get_by_id(&conn, target_event_id)?
            .ok_or_else(|| EventStoreError::EventNotFound(target_event_id.to_string()))?;

        let target_type = EventType::from(target.event_type.as_str());
        if !target_type.is_deletable() {
            return Err(EventStoreError::InvalidOperation(format!(
                "cannot delete event of type '{}' — only message and tool result events can be deleted",
                target.event_type
            )));
        }

        if !SessionRepo::exists(&conn, session_id)? {
            return Err(EventStoreError::SessionNotFound(session_id.to_string()));
        }

        let target_turn = serde_json::from_str::<Value>(&target.payload)
            .ok()
            .and_then(|p| p.get("turn").and_then(Value::as_i64));

        Ok(serde_json::to_value(MessageDeletedPayload {
            target_event_id: target_event_id.to_string(),
            target_type: target.event_type,
            target_turn,
            reason,
        })?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event retrieval
    // ─────────────────────────────────────────────────────────────────────

    /// Get a single event by ID.
    pub fn get_event(&self, event_id: &str) -> Result<Option<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_id(&conn, event_id)
    }

    /// Get all events for a session, ordered by sequence.
    pub fn get_events_by_session(
        &self,
        session_id: &str,
        opts: &ListEventsOptions,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_session(&conn, session_id, opts)
    }

    /// Get the ancestor chain from root to the given event (inclusive).
    pub fn get_ancestors(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_ancestors(&conn, event_id)
    }

    /// Get direct children of an event.
    pub fn get_children(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_children(&conn, event_id)
    }

    /// Get all descendants of an event (recursive).
    pub fn get_descendants(&self, event_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_descendants(&conn, event_id)
    }

    /// Get events appended after a specific sequence number.
    pub fn get_events_since(&self, session_id: &str, after_sequence: i64) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_since(&conn, session_id, after_sequence)
    }

    /// Batch-fetch events by IDs. Missing IDs are silently omitted.
    pub fn get_events_by_ids(&self, event_ids: &[&str]) -> Result<HashMap<String, EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_ids(&conn, event_ids)
    }

    /// Get events of specific types within a session.
    pub fn get_events_by_type(
        &self,
        session_id: &str,
        types: &[&str],
        limit: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_types(&conn, session_id, types, limit)
    }

    /// Get events by workspace and types (cross-session query).
    pub fn get_events_by_workspace_and_types(
        &self,
        workspace_id: &str,
        types: &[&str],
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        EventRepo::get_by_workspace_and_types(&conn, workspace_id, types, limit, offset)
    }

    /// Count events by workspace and types.
    pub fn count_events_by_workspace_and_types(
        &self,
        workspace_id: &str,
        types: &[&str],
    ) -> Result<i64> {
        let conn = self.conn()?;
        EventRepo::count_by_workspace_and_types(&conn, workspace_id, types)
    }

    /// Count total events in a session.
    pub fn count_events(&self, session_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        EventRepo::count_by_session(&conn, session_id)
    }

    /// Aggregate token usage for a session from event payloads.
    pub fn get_token_usage_summary(&self, session_id: &str) -> Result<TokenUsageSummary> {
        let conn = self.conn()?;
        EventRepo::get_token_usage_summary(&conn, session_id)
    }

    /// Check if a session was interrupted (last turn never finished).
    ///
    /// A session is interrupted when the last `message.assistant` event has
    /// a higher sequence than the last `stream.turn_end` event.
    pub fn was_session_interrupted(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let last_assistant = EventRepo::max_sequence_of_type(&conn, session_id, "message.assistant")?;
        let last_turn_end = EventRepo::max_sequence_of_type(&conn, session_id, "stream.turn_end")?;

        match (last_assistant, last_turn_end) {
            (None, _) => Ok(false),
            (Some(_), None) => Ok(true),
            (Some(a), Some(t)) => Ok(a > t),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // State projection (message reconstruction)
    // ─────────────────────────────────────────────────────────────────────

    /// Reconstruct messages at the session head.
    pub fn get_messages_at_head(&self, session_id: &str) -> Result<ReconstructionResult> {
        let conn = self.conn()?;
        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;
        let head_id = session
            .head_event_id
            .as_deref()
            .ok_or_else(|| EventStoreError::InvalidOperation("session has no head event".into()))?;
        let ancestors = EventRepo::get_ancestors(&conn, head_id)?;
        Ok(reconstruct_from_events(&rows_to_session_events(&ancestors)))
    }

    /// Reconstruct messages at a specific event.
    pub fn get_messages_at(&self, event_id: &str) -> Result<ReconstructionResult> {
        let conn = self.conn()?;
        let ancestors = EventRepo::get_ancestors(&conn, event_id)?;
        if ancestors.is_empty() {
            return Err(EventStoreError::EventNotFound(event_id.to_string()));
        }
        Ok(reconstruct_from_events(&rows_to_session_events(&ancestors)))
    }

    /// Build full session state at the head event.
    pub fn get_state_at_head(&self, session_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;
        let session = SessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_string()))?;
        let head_id = session
            .head_event_id
            .clone()
            .ok_or_else(|| EventStoreError::InvalidOperation("session has no head event".into()))?;
        let ancestors = EventRepo::get_ancestors(&conn, &head_id)?;
        let reconstruction = reconstruct_from_events(&rows_to_session_events(&ancestors));
        Ok(build_session_state(&session, &head_id, reconstruction))
    }

    /// Build full session state at a specific event.
    ///
    /// The session is derived from the event itself, so this works for any
    /// point in a fork's shared history.
    pub fn get_state_at(&self, event_id: &str) -> Result<SessionState> {
        let conn = self.conn()?;
        let ancestors = EventRepo::get_ancestors(&conn, event_id)?;
        let leaf = ancestors
            .last()
            .ok_or_else(|| EventStoreError::EventNotFound(event_id.to_string()))?;
        let session = SessionRepo::get_by_id(&conn, &leaf.session_id)?
            .ok_or_else(|| EventStoreError::SessionNotFound(leaf.session_id.clone()))?;
        let reconstruction = reconstruct_from_events(&rows_to_session_events(&ancestors));
        Ok(build_session_state(&session, event_id, reconstruction))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session management
    // ─────────────────────────────────────────────────────────────────────

    /// Get session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// List sessions with filtering.
    pub fn list_sessions(&self, opts: &ListSessionsOptions<'_>) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::list(&conn, opts)
    }

    /// Mark a session as ended.
    pub fn end_session(&self, session_id: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::mark_ended(&conn, session_id)
        })
    }

    /// Reactivate an ended session.
    pub fn clear_session_ended(&self, session_id: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::clear_ended(&conn, session_id)
        })
    }

    /// Update the latest model for a session.
    pub fn update_latest_model(&self, session_id: &str, model: &str) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_latest_model(&conn, session_id, model)
        })
    }

    /// Update session title.
    pub fn update_session_title(&self, session_id: &str, title: Option<&str>) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_title(&conn, session_id, title)
        })
    }

    /// Update session spawn linkage.
    pub fn update_spawn_info(
        &self,
        session_id: &str,
        spawning_session_id: &str,
        spawn_type: &str,
        spawn_task: &str,
    ) -> Result<bool> {
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SessionRepo::update_spawn_info(&conn, session_id, spawning_session_id, spawn_type, spawn_task)
        })
    }

    /// Delete a session and all its events (and FTS entries).
    #[instrument(skip(self), fields(session_id))]
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            let _ = EventRepo::delete_by_session(&tx, session_id)?;
            if self.fts_enabled {
                let _ = SearchRepo::remove_by_session(&tx, session_id)?;
            }
            let deleted = SessionRepo::delete(&tx, session_id)?;

            tx.commit()?;
            Ok(deleted)
        })?;

        if deleted {
            self.remove_session_write_lock(session_id)?;
        }
        Ok(deleted)
    }

    /// List sessions spawned by a parent session.
    pub fn list_spawned_sessions(&self, spawning_session_id: &str) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::list_spawned(&conn, spawning_session_id)
    }

    /// Batch-fetch sessions by IDs. Missing IDs are silently omitted.
    pub fn get_sessions_by_ids(&self, session_ids: &[&str]) -> Result<HashMap<String, SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_ids(&conn, session_ids)
    }

    /// Get message previews (last user prompt and assistant response) for a
    /// list of sessions — used by list views.
    pub fn get_session_message_previews(
        &self,
        session_ids: &[&str],
    ) -> Result<HashMap<String, MessagePreview>> {
        let conn = self.conn()?;
        SessionRepo::get_message_previews(&conn, session_ids)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Workspace management
    // ─────────────────────────────────────────────────────────────────────

    /// Get workspace by ID.
    pub fn get_workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::get_by_id(&conn, workspace_id)
    }

    /// Get workspace by path.
    pub fn get_workspace_by_path(&self, path: &str) -> Result<Option<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::get_by_path(&conn, path)
    }

    /// Get or create workspace by path.
    pub fn get_or_create_workspace(&self, path: &str, name: Option<&str>) -> Result<WorkspaceRow> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            WorkspaceRepo::get_or_create(&conn, path, name)
        })
    }

    /// List all workspaces.
    pub fn list_workspaces(&self) -> Result<Vec<WorkspaceRow>> {
        let conn = self.conn()?;
        WorkspaceRepo::list(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Blob storage
    // ─────────────────────────────────────────────────────────────────────

    /// Store blob content (SHA-256 deduplicated).
    pub fn put_blob(&self, content: &[u8], mime_type: &str) -> Result<StoreBlobResult> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            BlobRepo::store(&conn, content, mime_type)
        })
    }

    /// Get a blob by ID.
    pub fn get_blob(&self, blob_id: &str) -> Result<BlobRow> {
        let conn = self.conn()?;
        BlobRepo::get_by_id(&conn, blob_id)?
            .ok_or_else(|| EventStoreError::BlobNotFound(blob_id.to_string()))
    }

    /// Get blob content by ID.
    pub fn get_blob_content(&self, blob_id: &str) -> Result<Vec<u8>> {
        let conn = self.conn()?;
        BlobRepo::get_content(&conn, blob_id)?
            .ok_or_else(|| EventStoreError::BlobNotFound(blob_id.to_string()))
    }

    /// Decrement a blob's reference count (floored at zero). Returns the new
    /// count. Unreferenced rows are not purged automatically.
    pub fn release_blob(&self, blob_id: &str) -> Result<i64> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            BlobRepo::release(&conn, blob_id)?
                .ok_or_else(|| EventStoreError::BlobNotFound(blob_id.to_string()))
        })
    }

    /// Delete all blobs with zero references. Returns count deleted.
    pub fn sweep_unreferenced_blobs(&self) -> Result<usize> {
        self.with_global_write_lock(|| {
            let conn = self.conn()?;
            BlobRepo::delete_unreferenced(&conn)
        })
    }

    /// Total blob storage usage.
    pub fn blob_total_size(&self) -> Result<BlobSizeInfo> {
        let conn = self.conn()?;
        BlobRepo::get_total_size(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────

    /// Search event payloads (ranked when FTS is available).
    pub fn search(&self, query: &str, opts: &SearchOptions<'_>) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search(&conn, query, opts)
    }

    /// Search within a specific session.
    pub fn search_in_session(
        &self,
        session_id: &str,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        SearchRepo::search_in_session(&conn, session_id, query, limit)
    }

    /// Rebuild the FTS index for a session. No-op without FTS.
    pub fn rebuild_search_index(&self, session_id: &str) -> Result<usize> {
        if !self.fts_enabled {
            return Ok(0);
        }
        self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            SearchRepo::rebuild_session_index(&conn, session_id)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Logs
    // ─────────────────────────────────────────────────────────────────────

    /// Insert an operational log record.
    pub fn write_log(&self, record: &NewLogRecord) -> Result<i64> {
        let conn = self.conn()?;
        LogRepo::insert(&conn, record)
    }

    /// Log records for a session, oldest first.
    pub fn get_logs_by_session(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<LogRow>> {
        let conn = self.conn()?;
        LogRepo::get_by_session(&conn, session_id, limit)
    }

    /// Most recent log records across all sessions.
    pub fn recent_logs(&self, limit: i64) -> Result<Vec<LogRow>> {
        let conn = self.conn()?;
        LogRepo::recent(&conn, limit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Infer the provider from a model id prefix.
fn infer_provider(model: &str) -> String {
    let provider = if model.starts_with("claude-") {
        "anthropic"
    } else if model.starts_with("gpt-") || model.starts_with("o1-") || model.starts_with("o3-") {
        "openai"
    } else if model.starts_with("gemini-") {
        "google"
    } else {
        "anthropic"
    };
    provider.to_string()
}

/// Build counter deltas for an event about to be committed.
fn build_counters(event_type: &EventType, payload: &Value, session_model: &str) -> IncrementCounters {
    let mut counters = IncrementCounters {
        event_count: Some(1),
        ..Default::default()
    };

    if event_type.is_message() {
        counters.message_count = Some(1);
    }

    let token_usage: Option<TokenUsage> = payload
        .get("tokenUsage")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    if let Some(usage) = &token_usage {
        counters.input_tokens = Some(usage.input_tokens);
        counters.output_tokens = Some(usage.output_tokens);
        counters.cache_read_tokens = usage.cache_read_tokens;
        counters.cache_creation_tokens = usage.cache_creation_tokens;

        // Current context size: prefer normalizedUsage.contextWindowTokens
        // (includes cache reads), fall back to raw inputTokens.
        if *event_type == EventType::MessageAssistant {
            counters.last_turn_input_tokens = payload
                .get("normalizedUsage")
                .and_then(|n| n.get("contextWindowTokens"))
                .and_then(Value::as_i64)
                .or(Some(usage.input_tokens));
        }

        // Cost: explicit payload value, else the model tariff table.
        counters.cost = payload.get("cost").and_then(Value::as_f64).or_else(|| {
            let model = payload
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(session_model);
            pricing::estimate_cost(model, usage)
        });
    } else if let Some(cost) = payload.get("cost").and_then(Value::as_f64) {
        counters.cost = Some(cost);
    }

    counters
}

/// Convert `EventRow`s to `SessionEvent`s for reconstruction.
///
/// Invalid payload JSON falls back to `Value::Null` rather than failing the
/// whole reconstruction.
fn rows_to_session_events(rows: &[EventRow]) -> Vec<SessionEvent> {
    rows.iter()
        .map(|row| SessionEvent {
            id: row.id.clone(),
            parent_id: row.parent_id.clone(),
            session_id: row.session_id.clone(),
            workspace_id: row.workspace_id.clone(),
            timestamp: row.timestamp.clone(),
            event_type: EventType::from(row.event_type.as_str()),
            sequence: row.sequence,
            payload: serde_json::from_str(&row.payload).unwrap_or_else(|e| {
                warn!(event_id = %row.id, error = %e, "corrupt event payload, defaulting to null");
                Value::Null
            }),
        })
        .collect()
}

/// Build `SessionState` from a session row and a reconstruction result.
fn build_session_state(
    session: &SessionRow,
    head_event_id: &str,
    reconstruction: ReconstructionResult,
) -> SessionState {
    SessionState {
        session_id: session.id.clone(),
        workspace_id: session.workspace_id.clone(),
        head_event_id: head_event_id.to_string(),
        model: session.latest_model.clone(),
        working_directory: session.working_directory.clone(),
        token_usage: TokenUsage {
            input_tokens: reconstruction.token_usage.input_tokens,
            output_tokens: reconstruction.token_usage.output_tokens,
            cache_read_tokens: Some(reconstruction.token_usage.cache_read_tokens),
            cache_creation_tokens: Some(reconstruction.token_usage.cache_creation_tokens),
        },
        turn_count: reconstruction.turn_count,
        reasoning_level: reconstruction.reasoning_level,
        system_prompt: reconstruction.system_prompt,
        messages_with_event_ids: reconstruction.messages_with_event_ids,
        is_ended: session.ended_at.as_ref().map(|_| true),
        timestamp: Some(session.last_activity_at.clone()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
