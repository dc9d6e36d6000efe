//! Session lifecycle payloads: start, fork.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for `session.start` events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    /// Absolute path to the working directory.
    pub working_directory: String,
    /// LLM model ID.
    pub model: String,
    /// Provider name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Session title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// System prompt content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Client kind that opened the session (tui, ios, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,
    /// Client version string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form client metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Payload for `session.fork` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForkPayload {
    /// Session being forked from.
    pub source_session_id: String,
    /// Event ID at the fork point.
    pub source_event_id: String,
    /// Fork name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
