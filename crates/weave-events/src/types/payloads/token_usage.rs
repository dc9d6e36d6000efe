//! Token usage tracking types.
//!
//! [`TokenUsage`] uses `camelCase` field naming to match the wire format
//! produced by provider adapters.

use serde::{Deserialize, Serialize};

/// Token usage reported by LLM providers.
///
/// Optional cache fields are omitted from JSON when `None` and treated as
/// zero by all accounting code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Number of input tokens consumed.
    #[serde(default)]
    pub input_tokens: i64,
    /// Number of output tokens generated.
    #[serde(default)]
    pub output_tokens: i64,
    /// Tokens read from prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<i64>,
    /// Tokens written to prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<i64>,
}

/// Normalized usage attached to assistant message payloads.
///
/// `contextWindowTokens` is the authoritative "current context size" — it
/// includes cache reads, which raw `inputTokens` does not.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUsage {
    /// Total tokens occupying the context window after this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<i64>,
    /// Tokens newly added to the context this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_input_tokens: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_is_zero() {
        let usage = TokenUsage::default();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.cache_read_tokens, None);
        assert_eq!(usage.cache_creation_tokens, None);
    }

    #[test]
    fn serde_roundtrip_full() {
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 500,
            cache_read_tokens: Some(200),
            cache_creation_tokens: Some(100),
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["inputTokens"], 1000);
        assert_eq!(json["outputTokens"], 500);
        assert_eq!(json["cacheReadTokens"], 200);
        assert_eq!(json["cacheCreationTokens"], 100);

        let back: TokenUsage = serde_json::from_value(json).unwrap();
        assert_eq!(usage, back);
    }

    #[test]
    fn optional_fields_omitted() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            ..Default::default()
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert!(json.get("cacheReadTokens").is_none());
        assert!(json.get("cacheCreationTokens").is_none());
    }

    #[test]
    fn normalized_usage_wire_format() {
        let nu: NormalizedUsage =
            serde_json::from_value(json!({"contextWindowTokens": 5000, "newInputTokens": 1200}))
                .unwrap();
        assert_eq!(nu.context_window_tokens, Some(5000));
        assert_eq!(nu.new_input_tokens, Some(1200));
    }
}
