//! Linearized append queue — one serial writer per active session.
//!
//! The agent loop and ad-hoc RPC handlers may both append to the same
//! session. Without serialization, a second append issued while the first is
//! still committing would chain from the *database* head instead of the
//! *logical* head in flight, producing an orphaned branch.
//!
//! [`AppendQueue`] gives each active session a dedicated worker task with an
//! mpsc mailbox. The worker holds the in-memory pending head: each append
//! captures `parent_id = pending_head` only after the previous write has
//! committed, then advances the pending head. Guarantees:
//!
//! - **FIFO per session**: enqueue order equals commit order equals
//!   `parent_id` chain order. Sessions proceed in parallel.
//! - **Not cancellable**: once enqueued, an append commits even if the
//!   caller drops the future — the chain must stay intact.
//! - **No poisoning**: a failed write leaves the pending head at the prior
//!   value; the error reaches the waiting caller and later appends proceed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::errors::{EventStoreError, Result};
use crate::sqlite::row_types::EventRow;
use crate::store::{AppendOptions, EventStore};
use crate::types::{DeleteReason, EventType};

enum Job {
    Append {
        event_type: EventType,
        payload: Value,
        reply: Option<oneshot::Sender<Result<EventRow>>>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Per-session linearized append queues over a shared [`EventStore`].
pub struct AppendQueue {
    store: Arc<EventStore>,
    sessions: Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>,
}

impl AppendQueue {
    /// Create a queue layer over the given store.
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Append an event through the session's serial chain and wait for the
    /// committed row.
    ///
    /// The job is enqueued before this returns, so dropping the returned
    /// future does not cancel the write — the chain stays intact.
    pub fn append(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> impl Future<Output = Result<EventRow>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let enqueued = self.enqueue(
            session_id,
            Job::Append {
                event_type,
                payload,
                reply: Some(tx),
            },
        );
        async move {
            enqueued?;
            rx.await
                .map_err(|_| EventStoreError::Queue("append worker dropped the reply".into()))?
        }
    }

    /// Fire-and-forget append for event-driven producers (streaming deltas).
    ///
    /// The only contract is ordering relative to other appends for the same
    /// session; failures are logged, not delivered.
    pub fn append_detached(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> Result<()> {
        self.enqueue(
            session_id,
            Job::Append {
                event_type,
                payload,
                reply: None,
            },
        )
    }

    /// Delete a message by appending a `message.deleted` tombstone through
    /// the session's serial chain.
    pub async fn delete_message(
        &self,
        session_id: &str,
        target_event_id: &str,
        reason: Option<DeleteReason>,
    ) -> Result<EventRow> {
        let store = Arc::clone(&self.store);
        let sid = session_id.to_string();
        let target = target_event_id.to_string();
        let payload = tokio::task::spawn_blocking(move || {
            store.deletion_payload(&sid, &target, reason.unwrap_or_default())
        })
        .await
        .map_err(|e| EventStoreError::Internal(format!("blocking task panicked: {e}")))??;

        self.append(session_id, EventType::MessageDeleted, payload)
            .await
    }

    /// Wait until every append enqueued for the session so far has committed.
    pub async fn flush(&self, session_id: &str) -> Result<()> {
        let sender = {
            let sessions = self.lock_sessions()?;
            sessions.get(session_id).cloned()
        };
        let Some(sender) = sender else {
            return Ok(());
        };

        let (tx, rx) = oneshot::channel();
        if sender.send(Job::Flush { done: tx }).is_err() {
            // Worker already exited; nothing in flight.
            return Ok(());
        }
        rx.await
            .map_err(|_| EventStoreError::Queue("flush worker dropped the reply".into()))
    }

    /// Flush every active session's queue.
    pub async fn flush_all(&self) -> Result<()> {
        let session_ids: Vec<String> = {
            let sessions = self.lock_sessions()?;
            sessions.keys().cloned().collect()
        };
        for session_id in session_ids {
            self.flush(&session_id).await?;
        }
        Ok(())
    }

    /// Whether a worker is active for the session.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.lock_sessions()
            .map(|s| s.contains_key(session_id))
            .unwrap_or(false)
    }

    /// Drop the session's worker once its mailbox drains (e.g. when the
    /// session ends). In-flight appends still commit.
    pub fn release_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.lock_sessions()?;
        let _ = sessions.remove(session_id);
        Ok(())
    }

    fn enqueue(&self, session_id: &str, job: Job) -> Result<()> {
        let mut sessions = self.lock_sessions()?;
        let sender = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| spawn_worker(Arc::clone(&self.store), session_id.to_string()));
        sender
            .send(job)
            .map_err(|_| EventStoreError::Queue("append worker is gone".into()))
    }

    fn lock_sessions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Job>>>> {
        self.sessions
            .lock()
            .map_err(|_| EventStoreError::Internal("append queue map poisoned".into()))
    }
}

/// Spawn the serial worker for one session.
fn spawn_worker(store: Arc<EventStore>, session_id: String) -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _ = tokio::spawn(async move {
        // The logical head of the chain. `None` defers to the session's
        // database head for the first write.
        let mut pending_head: Option<String> = None;

        while let Some(job) = rx.recv().await {
            match job {
                Job::Append {
                    event_type,
                    payload,
                    reply,
                } => {
                    let result = run_append(
                        &store,
                        &session_id,
                        event_type,
                        payload,
                        pending_head.clone(),
                    )
                    .await;

                    match &result {
                        Ok(row) => pending_head = Some(row.id.clone()),
                        Err(e) => {
                            // Chain re-establishes at the prior head.
                            debug!(session_id = %session_id, error = %e, "queued append failed");
                        }
                    }

                    match reply {
                        Some(tx) => {
                            let _ = tx.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                warn!(session_id = %session_id, error = %e, "detached append failed");
                            }
                        }
                    }
                }
                Job::Flush { done } => {
                    let _ = done.send(());
                }
            }
        }
    });

    tx
}

async fn run_append(
    store: &Arc<EventStore>,
    session_id: &str,
    event_type: EventType,
    payload: Value,
    parent_id: Option<String>,
) -> Result<EventRow> {
    let store = Arc::clone(store);
    let session_id = session_id.to_string();
    tokio::task::spawn_blocking(move || {
        store.append(&AppendOptions {
            session_id: &session_id,
            event_type,
            payload,
            parent_id: parent_id.as_deref(),
        })
    })
    .await
    .map_err(|e| EventStoreError::Internal(format!("blocking task panicked: {e}")))?
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
