//! Reconstructed-state types: messages, session state, search results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event_type::EventType;
use super::payloads::TokenUsage;

/// A reconstructed message from the event history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message role (`user` or `assistant`).
    pub role: String,
    /// Message content — a plain string or an array of content blocks.
    /// Synthetic tool-result messages carry `tool_result` blocks.
    pub content: Value,
}

/// A message with its source event IDs.
///
/// Merged messages carry one entry per source event; synthetic messages
/// (compaction pair, flushed tool results) carry a single `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithEventId {
    /// The reconstructed message.
    pub message: Message,
    /// Source event IDs.
    pub event_ids: Vec<Option<String>>,
}

/// Full state of a session at a given point in its history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Session ID.
    pub session_id: String,
    /// Workspace ID.
    pub workspace_id: String,
    /// Event the state was reconstructed at.
    pub head_event_id: String,
    /// Current model.
    pub model: String,
    /// Working directory.
    pub working_directory: String,
    /// Reconstructed messages.
    pub messages_with_event_ids: Vec<MessageWithEventId>,
    /// Aggregate token usage over the ancestor chain.
    pub token_usage: TokenUsage,
    /// Highest turn number seen.
    pub turn_count: i64,
    /// Effective reasoning level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<String>,
    /// Effective system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Whether the session has ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ended: Option<bool>,
    /// Timestamp of the session's last activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Search hit over event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Event ID.
    pub event_id: String,
    /// Session ID.
    pub session_id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Timestamp.
    pub timestamp: String,
    /// Highlighted snippet (FTS) or content excerpt (fallback scan).
    pub snippet: String,
    /// BM25 relevance score; 0 for fallback scans.
    pub score: f64,
}
