//! Configuration change payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasoning effort levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    /// Minimal reasoning budget.
    Low,
    /// Default reasoning budget.
    Medium,
    /// Extended reasoning budget.
    High,
    /// Maximum reasoning budget.
    Xhigh,
}

impl ReasoningLevel {
    /// The wire string for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Xhigh => "xhigh",
        }
    }
}

impl fmt::Display for ReasoningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for `config.model_switch` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigModelSwitchPayload {
    /// Model in effect before the switch.
    pub previous_model: String,
    /// Model in effect after the switch.
    pub new_model: String,
}

/// Payload for `config.reasoning_level` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReasoningLevelPayload {
    /// Level in effect before the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_level: Option<ReasoningLevel>,
    /// Level in effect after the change.
    pub new_level: ReasoningLevel,
}

/// Payload for `config.prompt_update` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPromptUpdatePayload {
    /// SHA-256 of the new prompt content.
    pub new_hash: String,
    /// Blob holding the full prompt content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_blob_id: Option<String>,
}
