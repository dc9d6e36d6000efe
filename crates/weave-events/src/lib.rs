//! # weave-events
//!
//! Event-sourced conversation store with a `SQLite` backend for the Weave
//! agent. Each session is an append-only graph of events; the messages view
//! presented to an LLM is reconstructed from the graph at any point in its
//! history.
//!
//! Responsibilities:
//!
//! - **Event types**: [`EventType`] discriminator with verbatim passthrough
//!   for unknown types, plus typed payload structs.
//! - **Event store**: transactional [`EventStore`] facade — session
//!   creation, append, ancestor walks, fork, delete, search, blobs, logs.
//! - **Linearized appends**: [`AppendQueue`], one serial writer per active
//!   session so concurrent producers never fork the chain.
//! - **Reconstruction**: [`reconstruct_from_events`], the two-pass algorithm
//!   turning an ancestor list into a canonical messages view.
//! - **Memory ledger**: [`memory::query_ledger`] over `memory.ledger` events.
//! - **Migrations**: version-tracked, forward-only SQL schema evolution.

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod memory;
pub mod pricing;
pub mod queue;
pub mod reconstruct;
pub mod sqlite;
pub mod store;
pub mod types;

pub use errors::{EventStoreError, Result};
pub use logging::{LogLevel, LogWriter};
pub use queue::AppendQueue;
pub use reconstruct::{
    COMPACTION_ACK_TEXT, COMPACTION_SUMMARY_PREFIX, ReconstructedTokenUsage, ReconstructionResult,
    reconstruct_from_events,
};
pub use sqlite::repositories::search::{SEARCH_LIMIT_CAP, SearchOptions};
pub use sqlite::repositories::session::{ListSessionsOptions, MessagePreview};
pub use sqlite::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use store::{
    AppendOptions, CreateSessionOptions, CreateSessionResult, EventStore, ForkOptions, ForkResult,
};
pub use types::{
    ALL_EVENT_TYPES, DeleteReason, EventType, Message, MessageWithEventId, ReasoningLevel,
    SearchResult, SessionEvent, SessionEventPayload, SessionState, TokenUsage,
};
