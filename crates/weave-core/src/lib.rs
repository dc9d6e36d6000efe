//! # weave-core
//!
//! Shared primitives for the Weave conversation store:
//!
//! - **Typed ids**: [`WorkspaceId`], [`SessionId`], [`EventId`], [`BlobId`],
//!   [`ToolCallId`] — prefixed, hex-encoded, generated from UUIDv7 so they
//!   sort in creation order.
//! - **Time**: ISO-8601 UTC timestamp helpers used for every persisted row.

#![deny(unsafe_code)]

pub mod ids;
pub mod time;

pub use ids::{BlobId, EventId, SessionId, ToolCallId, WorkspaceId};
pub use time::now_iso;
