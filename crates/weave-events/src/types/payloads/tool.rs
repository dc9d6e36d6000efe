//! Tool invocation payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for `tool.call` events.
///
/// Carries the authoritative, untruncated tool arguments. When an assistant
/// message stores a `tool_use` block with `input._truncated = true`, the
/// reconstructor restores the input from the matching `tool.call`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    /// Correlates with the `tool_use` block id and the later `tool.result`.
    pub tool_call_id: String,
    /// Tool name.
    pub name: String,
    /// Full tool arguments.
    pub arguments: Value,
    /// Turn number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<i64>,
}

/// Payload for `tool.result` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    /// The tool call this result answers.
    pub tool_call_id: String,
    /// Result content (string or content blocks).
    pub content: Value,
    /// Whether the tool failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Execution duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Blob holding the full output when it was too large to inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
}
