//! Typed payload structs, one module per event type domain.
//!
//! Payloads are stored at rest as opaque JSON; these types are the lazy,
//! boundary-level view obtained via
//! [`SessionEvent::typed_payload()`](crate::types::SessionEvent::typed_payload).

pub mod compact;
pub mod config;
pub mod memory;
pub mod message;
pub mod message_ops;
pub mod plan;
pub mod session;
pub mod skill;
pub mod streaming;
pub mod token_usage;
pub mod tool;

pub use config::ReasoningLevel;
pub use message_ops::DeleteReason;
pub use token_usage::{NormalizedUsage, TokenUsage};
