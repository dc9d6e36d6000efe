//! Event type definitions for the Weave event store.
//!
//! - [`EventType`]: discriminator enum with verbatim passthrough for
//!   unknown types.
//! - [`SessionEvent`]: flat struct with base fields + opaque `payload` JSON.
//! - [`SessionEventPayload`]: typed payload access via
//!   [`SessionEvent::typed_payload()`].
//! - [`payloads`]: typed payload structs per event type domain.
//! - [`state`]: reconstructed messages, session state, search results.

pub mod base;
pub mod event_type;
pub mod payloads;
pub mod state;

pub use base::{SessionEvent, SessionEventPayload};
pub use event_type::{ALL_EVENT_TYPES, EventType};
pub use payloads::{DeleteReason, NormalizedUsage, ReasoningLevel, TokenUsage};
pub use state::{Message, MessageWithEventId, SearchResult, SessionState};
