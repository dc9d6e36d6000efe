//! Message operation payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason carried by a `message.deleted` tombstone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// The user asked for the message to be removed.
    #[default]
    UserRequest,
    /// Removed to satisfy a content policy.
    ContentPolicy,
    /// Removed by automatic context management.
    ContextManagement,
}

impl DeleteReason {
    /// The wire string for this reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserRequest => "user_request",
            Self::ContentPolicy => "content_policy",
            Self::ContextManagement => "context_management",
        }
    }
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for `message.deleted` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    /// Event ID of the message being deleted.
    pub target_event_id: String,
    /// Type of the target message.
    pub target_type: String,
    /// Turn number of the deleted message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_turn: Option<i64>,
    /// Reason for deletion.
    pub reason: DeleteReason,
}
