//! Message event payloads: user, assistant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::token_usage::{NormalizedUsage, TokenUsage};

/// Payload for `message.user` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessagePayload {
    /// User message content — either a plain string or an array of content blocks.
    pub content: Value,
    /// Token usage, when the client attributes tokens to the user turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Turn number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<i64>,
}

/// Payload for `message.assistant` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessagePayload {
    /// Content blocks (text, `tool_use`, thinking).
    pub content: Value,
    /// Turn number.
    pub turn: i64,
    /// Token usage for this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Normalized usage including the authoritative context window size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_usage: Option<NormalizedUsage>,
    /// LLM stop reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Model ID used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Cost in USD, when the provider reports it directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}
