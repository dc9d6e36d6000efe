//! Message reconstruction from event ancestry.
//!
//! [`reconstruct_from_events`] rebuilds the messages view from an ordered
//! ancestor list in two passes:
//!
//! 1. **First pass**: collect deleted event IDs, tool call argument maps,
//!    reasoning level, and system prompt.
//! 2. **Second pass**: build messages while handling deletions, compaction,
//!    context clears, tool result injection, truncated-input restoration,
//!    and consecutive-role merging.
//!
//! Reconstruction never fails: unknown event types are ignored and missing
//! optional payload fields are tolerated.

use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use crate::types::base::SessionEvent;
use crate::types::event_type::EventType;
use crate::types::state::{Message, MessageWithEventId};

/// Prefix of the synthetic user message injected at a compaction point.
pub const COMPACTION_SUMMARY_PREFIX: &str = "[Context from earlier in this conversation]";
/// Synthetic assistant acknowledgement injected after the compaction summary.
pub const COMPACTION_ACK_TEXT: &str =
    "I understand the previous context. Let me continue helping you.";

/// Result of reconstructing messages from event ancestry.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructionResult {
    /// Reconstructed messages with their source event IDs.
    pub messages_with_event_ids: Vec<MessageWithEventId>,
    /// Aggregate token usage across all message events in the chain.
    pub token_usage: ReconstructedTokenUsage,
    /// Highest turn number seen.
    pub turn_count: i64,
    /// Last-seen reasoning level from `config.reasoning_level` events.
    pub reasoning_level: Option<String>,
    /// System prompt from `session.start`, overridden by `config.prompt_update`.
    pub system_prompt: Option<String>,
}

/// Aggregate token usage accumulated during reconstruction.
///
/// Missing cache counters are treated as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconstructedTokenUsage {
    /// Total input tokens.
    pub input_tokens: i64,
    /// Total output tokens.
    pub output_tokens: i64,
    /// Total cache read tokens.
    pub cache_read_tokens: i64,
    /// Total cache creation tokens.
    pub cache_creation_tokens: i64,
}

/// Pending tool result accumulated between assistant messages.
struct PendingToolResult {
    tool_call_id: String,
    content: Value,
    is_error: bool,
}

/// Pass 1 output: cross-cutting state collected from the ancestor list.
struct Metadata {
    deleted_event_ids: HashSet<String>,
    tool_call_args: HashMap<String, Value>,
    reasoning_level: Option<String>,
    system_prompt: Option<String>,
}

/// Mutable state carried through the message-building pass.
struct BuildState {
    combined: Vec<MessageWithEventId>,
    tokens: ReconstructedTokenUsage,
    turn_count: i64,
    pending_tool_results: Vec<PendingToolResult>,
}

/// Reconstruct messages and state from an ordered list of ancestor events
/// (root first, leaf last).
pub fn reconstruct_from_events(ancestors: &[SessionEvent]) -> ReconstructionResult {
    let metadata = collect_metadata(ancestors);
    build_messages(ancestors, &metadata)
}

/// Pass 1: collect deleted event IDs, tool call arguments, and config state.
fn collect_metadata(ancestors: &[SessionEvent]) -> Metadata {
    let mut deleted_event_ids = HashSet::new();
    let mut tool_call_args = HashMap::new();
    let mut reasoning_level: Option<String> = None;
    let mut system_prompt: Option<String> = None;

    for event in ancestors {
        match &event.event_type {
            EventType::MessageDeleted => {
                if let Some(target) = event.payload.get("targetEventId").and_then(Value::as_str) {
                    let _ = deleted_event_ids.insert(target.to_string());
                }
            }
            EventType::ToolCall => {
                let tc_id = event.payload.get("toolCallId").and_then(Value::as_str);
                let args = event.payload.get("arguments");
                if let (Some(id), Some(a)) = (tc_id, args) {
                    let _ = tool_call_args.insert(id.to_string(), a.clone());
                }
            }
            EventType::ConfigReasoningLevel => {
                if let Some(level) = event.payload.get("newLevel").and_then(Value::as_str) {
                    reasoning_level = Some(level.to_string());
                }
            }
            EventType::SessionStart => {
                if let Some(sp) = event.payload.get("systemPrompt").and_then(Value::as_str) {
                    system_prompt = Some(sp.to_string());
                }
            }
            EventType::ConfigPromptUpdate => {
                if let Some(hash) = event.payload.get("newHash").and_then(Value::as_str) {
                    system_prompt = Some(format!("[Updated prompt - hash: {hash}]"));
                }
            }
            _ => {}
        }
    }

    Metadata {
        deleted_event_ids,
        tool_call_args,
        reasoning_level,
        system_prompt,
    }
}

/// Pass 2: build messages from events using metadata from pass 1.
fn build_messages(ancestors: &[SessionEvent], metadata: &Metadata) -> ReconstructionResult {
    let mut st = BuildState {
        combined: Vec::new(),
        tokens: ReconstructedTokenUsage::default(),
        turn_count: 0,
        pending_tool_results: Vec::new(),
    };

    for event in ancestors {
        if metadata.deleted_event_ids.contains(&event.id) {
            continue;
        }
        match &event.event_type {
            EventType::CompactSummary => handle_compact_summary(event, &mut st),
            EventType::ContextCleared => handle_context_cleared(&mut st),
            EventType::ToolResult => handle_tool_result(event, &mut st),
            EventType::MessageUser => handle_message_user(event, &mut st),
            EventType::MessageAssistant => handle_message_assistant(event, metadata, &mut st),
            _ => {}
        }
    }

    // End-of-walk flush: a session persisted mid-agentic-loop ends on an
    // assistant tool_use whose results arrived but were never consumed.
    if !st.pending_tool_results.is_empty() {
        if let Some(last) = st.combined.last() {
            if last.message.role == "assistant" && content_has_tool_use(&last.message.content) {
                flush_tool_results(&mut st);
            }
        }
    }
    st.pending_tool_results.clear();

    ReconstructionResult {
        messages_with_event_ids: st.combined,
        token_usage: st.tokens,
        turn_count: st.turn_count,
        reasoning_level: metadata.reasoning_level.clone(),
        system_prompt: metadata.system_prompt.clone(),
    }
}

/// Handle `compact.summary`: clear all state, inject the synthetic pair.
fn handle_compact_summary(event: &SessionEvent, st: &mut BuildState) {
    let summary = event
        .payload
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("");
    st.combined.clear();
    st.pending_tool_results.clear();

    st.combined.push(MessageWithEventId {
        message: Message {
            role: "user".to_string(),
            content: Value::String(format!("{COMPACTION_SUMMARY_PREFIX}\n\n{summary}")),
        },
        event_ids: vec![None],
    });
    st.combined.push(MessageWithEventId {
        message: Message {
            role: "assistant".to_string(),
            content: json!([{ "type": "text", "text": COMPACTION_ACK_TEXT }]),
        },
        event_ids: vec![None],
    });
}

/// Handle `context.cleared`: discard all messages and pending results.
fn handle_context_cleared(st: &mut BuildState) {
    st.combined.clear();
    st.pending_tool_results.clear();
}

/// Handle `tool.result`: accumulate for later flushing.
fn handle_tool_result(event: &SessionEvent, st: &mut BuildState) {
    let tool_call_id = event
        .payload
        .get("toolCallId")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let content = event.payload.get("content").cloned().unwrap_or(Value::Null);
    let is_error = event
        .payload
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    st.pending_tool_results.push(PendingToolResult {
        tool_call_id,
        content,
        is_error,
    });
}

/// Handle `message.user`: a real user turn supersedes in-flight tool
/// results; consecutive user messages merge.
fn handle_message_user(event: &SessionEvent, st: &mut BuildState) {
    st.pending_tool_results.clear();

    let content = event.payload.get("content").cloned().unwrap_or(Value::Null);

    if st.combined.last().is_some_and(|e| e.message.role == "user") {
        let last = st.combined.last_mut().unwrap();
        last.message.content = merge_user_content(&last.message.content, &content);
        last.event_ids.push(Some(event.id.clone()));
    } else {
        st.combined.push(MessageWithEventId {
            message: Message {
                role: "user".to_string(),
                content,
            },
            event_ids: vec![Some(event.id.clone())],
        });
    }
    accumulate_tokens(&event.payload, &mut st.tokens);
}

/// Handle `message.assistant`: restore truncated inputs, flush pending tool
/// results, merge consecutive assistant messages, track turns.
fn handle_message_assistant(event: &SessionEvent, metadata: &Metadata, st: &mut BuildState) {
    let content = event.payload.get("content").cloned().unwrap_or(Value::Null);
    let restored = restore_truncated_inputs(&content, &metadata.tool_call_args);
    let has_tool_use = content_has_tool_use(&restored);

    // CASE A: last was assistant with pending tool results — flush first so
    // the results land between the two assistant turns.
    if st
        .combined
        .last()
        .is_some_and(|e| e.message.role == "assistant")
        && !st.pending_tool_results.is_empty()
    {
        flush_tool_results(st);
    }

    // Re-check after the potential flush — merge consecutive assistants.
    if st
        .combined
        .last()
        .is_some_and(|e| e.message.role == "assistant")
    {
        let last = st.combined.last_mut().unwrap();
        last.message.content = merge_block_arrays(&last.message.content, &restored);
        last.event_ids.push(Some(event.id.clone()));
    } else {
        st.combined.push(MessageWithEventId {
            message: Message {
                role: "assistant".to_string(),
                content: restored,
            },
            event_ids: vec![Some(event.id.clone())],
        });
    }

    // CASE B: this assistant calls tools and results already arrived.
    if has_tool_use && !st.pending_tool_results.is_empty() {
        flush_tool_results(st);
    }

    accumulate_tokens(&event.payload, &mut st.tokens);

    if let Some(turn) = event.payload.get("turn").and_then(Value::as_i64) {
        st.turn_count = st.turn_count.max(turn);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Flush pending tool results as one synthetic user message carrying a
/// `tool_result` block per result.
fn flush_tool_results(st: &mut BuildState) {
    let blocks: Vec<Value> = st
        .pending_tool_results
        .drain(..)
        .map(|tr| {
            json!({
                "type": "tool_result",
                "tool_use_id": tr.tool_call_id,
                "content": tr.content,
                "is_error": tr.is_error,
            })
        })
        .collect();

    st.combined.push(MessageWithEventId {
        message: Message {
            role: "user".to_string(),
            content: Value::Array(blocks),
        },
        event_ids: vec![None],
    });
}

/// Merge two user contents by concatenating their normalized block arrays.
fn merge_user_content(existing: &Value, incoming: &Value) -> Value {
    let mut merged = normalize_user_content(existing);
    merged.extend(normalize_user_content(incoming));
    Value::Array(merged)
}

/// Merge two assistant contents (both block arrays) by concatenation.
fn merge_block_arrays(existing: &Value, incoming: &Value) -> Value {
    let mut merged = match existing {
        Value::Array(a) => a.clone(),
        _ => vec![],
    };
    match incoming {
        Value::Array(a) => merged.extend(a.iter().cloned()),
        _ => {}
    }
    Value::Array(merged)
}

/// Normalize user content to an array of content blocks.
fn normalize_user_content(content: &Value) -> Vec<Value> {
    match content {
        Value::String(s) => vec![json!({"type": "text", "text": s})],
        Value::Array(arr) => arr.clone(),
        _ => vec![],
    }
}

/// Check if content contains any `tool_use` blocks.
fn content_has_tool_use(content: &Value) -> bool {
    match content {
        Value::Array(arr) => arr
            .iter()
            .any(|block| block.get("type").and_then(Value::as_str) == Some("tool_use")),
        _ => false,
    }
}

/// Restore truncated `tool_use` inputs from the tool call args map.
///
/// Blocks whose `tool.call` is absent (legacy data) keep the truncated
/// marker as-is.
fn restore_truncated_inputs(content: &Value, tool_call_args: &HashMap<String, Value>) -> Value {
    let Value::Array(arr) = content else {
        return content.clone();
    };

    let restored: Vec<Value> = arr
        .iter()
        .map(|block| {
            let is_tool_use = block.get("type").and_then(Value::as_str) == Some("tool_use");
            let is_truncated = block
                .get("input")
                .and_then(|i| i.get("_truncated"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if is_tool_use && is_truncated {
                if let Some(id) = block.get("id").and_then(Value::as_str) {
                    if let Some(full_args) = tool_call_args.get(id) {
                        let mut restored_block = block.clone();
                        restored_block["input"] = full_args.clone();
                        return restored_block;
                    }
                }
            }
            block.clone()
        })
        .collect();
    Value::Array(restored)
}

/// Accumulate token usage from a payload's `tokenUsage` field.
fn accumulate_tokens(payload: &Value, tokens: &mut ReconstructedTokenUsage) {
    if let Some(tu) = payload.get("tokenUsage") {
        tokens.input_tokens += tu.get("inputTokens").and_then(Value::as_i64).unwrap_or(0);
        tokens.output_tokens += tu.get("outputTokens").and_then(Value::as_i64).unwrap_or(0);
        tokens.cache_read_tokens += tu
            .get("cacheReadTokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        tokens.cache_creation_tokens += tu
            .get("cacheCreationTokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ev(event_type: EventType, payload: Value) -> SessionEvent {
        SessionEvent {
            id: format!("evt_{}", uuid::Uuid::now_v7().simple()),
            parent_id: None,
            session_id: "sess_test".to_string(),
            workspace_id: "ws_test".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            event_type,
            sequence: 0,
            payload,
        }
    }

    fn ev_with_id(id: &str, event_type: EventType, payload: Value) -> SessionEvent {
        SessionEvent {
            id: id.to_string(),
            ..ev(event_type, payload)
        }
    }

    fn get_messages(result: &ReconstructionResult) -> Vec<&Message> {
        result
            .messages_with_event_ids
            .iter()
            .map(|m| &m.message)
            .collect()
    }

    fn session_start() -> SessionEvent {
        ev(
            EventType::SessionStart,
            json!({"workingDirectory": "/test", "model": "claude-opus-4-6"}),
        )
    }

    // ── Empty input ──────────────────────────────────────────────────

    #[test]
    fn empty_events_returns_empty() {
        let result = reconstruct_from_events(&[]);
        assert!(result.messages_with_event_ids.is_empty());
        assert_eq!(result.turn_count, 0);
        assert!(result.reasoning_level.is_none());
        assert!(result.system_prompt.is_none());
    }

    #[test]
    fn session_start_only_no_messages() {
        let result = reconstruct_from_events(&[session_start()]);
        assert!(result.messages_with_event_ids.is_empty());
        assert_eq!(result.token_usage, ReconstructedTokenUsage::default());
        assert_eq!(result.turn_count, 0);
    }

    // ── Seed scenario 1: single turn ─────────────────────────────────

    #[test]
    fn single_turn() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "hi"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "text", "text": "hello"}],
                    "turn": 1,
                    "tokenUsage": {"inputTokens": 5, "outputTokens": 3},
                }),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(msgs[0].content, "hi");
        assert_eq!(msgs[1].role, "assistant");
        assert_eq!(msgs[1].content[0]["text"], "hello");
        assert_eq!(result.token_usage.input_tokens, 5);
        assert_eq!(result.token_usage.output_tokens, 3);
        assert_eq!(result.turn_count, 1);
    }

    // ── Seed scenario 2: tool loop with flush ────────────────────────

    #[test]
    fn tool_loop_with_flush() {
        let u = ev_with_id("evt_u", EventType::MessageUser, json!({"content": "do X"}));
        let a1 = ev_with_id(
            "evt_a1",
            EventType::MessageAssistant,
            json!({
                "content": [{"type": "tool_use", "id": "c1", "name": "Tool", "input": {}}],
                "turn": 1,
            }),
        );
        let tr = ev(
            EventType::ToolResult,
            json!({"toolCallId": "c1", "content": "OK", "isError": false}),
        );
        let a2 = ev_with_id(
            "evt_a2",
            EventType::MessageAssistant,
            json!({"content": [{"type": "text", "text": "done"}], "turn": 2}),
        );
        let result = reconstruct_from_events(&[session_start(), u, a1, tr, a2]);
        let entries = &result.messages_with_event_ids;

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].message.role, "user");
        assert_eq!(entries[1].message.role, "assistant");
        assert_eq!(entries[2].message.role, "user");
        assert_eq!(entries[3].message.role, "assistant");

        // The synthetic tool-result user message carries one tool_result block.
        let blocks = entries[2].message.content.as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["type"], "tool_result");
        assert_eq!(blocks[0]["tool_use_id"], "c1");
        assert_eq!(blocks[0]["content"], "OK");
        assert_eq!(blocks[0]["is_error"], false);

        assert_eq!(entries[0].event_ids, vec![Some("evt_u".to_string())]);
        assert_eq!(entries[1].event_ids, vec![Some("evt_a1".to_string())]);
        assert_eq!(entries[2].event_ids, vec![None]);
        assert_eq!(entries[3].event_ids, vec![Some("evt_a2".to_string())]);
    }

    // ── Seed scenario 3: mid-loop resume ─────────────────────────────

    #[test]
    fn mid_loop_resume_flushes_trailing_results() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "do X"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "Tool", "input": {}}],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "OK", "isError": false}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2].role, "user");
        assert_eq!(msgs[2].content[0]["type"], "tool_result");
        assert_eq!(result.messages_with_event_ids[2].event_ids, vec![None]);
    }

    #[test]
    fn trailing_result_without_tool_use_is_dropped() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "hi"})),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "plain"}], "turn": 1}),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "stray", "content": "orphan"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        assert_eq!(result.messages_with_event_ids.len(), 2);
    }

    // ── Seed scenario 4: compaction ──────────────────────────────────

    #[test]
    fn compaction_replaces_history() {
        let mut events = vec![session_start()];
        for turn in 1..=10 {
            events.push(ev(
                EventType::MessageUser,
                json!({"content": format!("question {turn}")}),
            ));
            events.push(ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": format!("answer {turn}")}], "turn": turn}),
            ));
        }
        events.push(ev(
            EventType::CompactSummary,
            json!({"summary": "S", "boundaryEventId": "evt_b"}),
        ));
        events.push(ev(EventType::MessageUser, json!({"content": "next"})));

        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(
            msgs[0].content,
            "[Context from earlier in this conversation]\n\nS"
        );
        assert_eq!(msgs[1].role, "assistant");
        assert_eq!(msgs[1].content[0]["text"], COMPACTION_ACK_TEXT);
        assert_eq!(msgs[2].role, "user");
        assert_eq!(msgs[2].content, "next");

        assert_eq!(result.messages_with_event_ids[0].event_ids, vec![None]);
        assert_eq!(result.messages_with_event_ids[1].event_ids, vec![None]);
    }

    #[test]
    fn compaction_clears_pending_tool_results() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "use tool"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "T", "input": {}}],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "R"}),
            ),
            ev(
                EventType::CompactSummary,
                json!({"summary": "sum", "boundaryEventId": "evt_b"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(msgs[1].role, "assistant");
    }

    // ── Context cleared ──────────────────────────────────────────────

    #[test]
    fn context_cleared_discards_all_messages() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "old"})),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "old answer"}], "turn": 1}),
            ),
            ev(EventType::ContextCleared, json!({})),
        ];
        let result = reconstruct_from_events(&events);
        assert!(result.messages_with_event_ids.is_empty());
    }

    #[test]
    fn context_cleared_then_fresh_start() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "old"})),
            ev(EventType::ContextCleared, json!({})),
            ev(EventType::MessageUser, json!({"content": "fresh"})),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "fresh");
    }

    // ── Deletion ─────────────────────────────────────────────────────

    #[test]
    fn deleted_message_excluded() {
        let events = vec![
            session_start(),
            ev_with_id("evt_u", EventType::MessageUser, json!({"content": "bye"})),
            ev(
                EventType::MessageDeleted,
                json!({"targetEventId": "evt_u", "targetType": "message.user", "reason": "user_request"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        assert!(result.messages_with_event_ids.is_empty());
    }

    // ── Seed scenario 6: delete then merge ───────────────────────────

    #[test]
    fn deleting_middle_user_merges_neighbors() {
        let events = vec![
            session_start(),
            ev_with_id("evt_u1", EventType::MessageUser, json!({"content": "one"})),
            ev_with_id("evt_u2", EventType::MessageUser, json!({"content": "two"})),
            ev_with_id("evt_u3", EventType::MessageUser, json!({"content": "three"})),
            ev(
                EventType::MessageDeleted,
                json!({"targetEventId": "evt_u2", "targetType": "message.user", "reason": "user_request"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let entries = &result.messages_with_event_ids;

        assert_eq!(entries.len(), 1);
        let blocks = entries[0].message.content.as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["text"], "one");
        assert_eq!(blocks[1]["text"], "three");
        assert_eq!(
            entries[0].event_ids,
            vec![Some("evt_u1".to_string()), Some("evt_u3".to_string())]
        );
    }

    // ── Merging ──────────────────────────────────────────────────────

    #[test]
    fn merge_consecutive_user_messages() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "first"})),
            ev(EventType::MessageUser, json!({"content": "second"})),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 1);
        let blocks = msgs[0].content.as_array().unwrap();
        assert_eq!(blocks[0]["text"], "first");
        assert_eq!(blocks[1]["text"], "second");
    }

    #[test]
    fn merge_user_messages_with_array_content() {
        let events = vec![
            session_start(),
            ev(
                EventType::MessageUser,
                json!({"content": [{"type": "text", "text": "Block A"}]}),
            ),
            ev(
                EventType::MessageUser,
                json!({"content": [{"type": "text", "text": "Block B"}]}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content.as_array().unwrap().len(), 2);
    }

    #[test]
    fn merge_consecutive_assistant_messages() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "go"})),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "part one"}], "turn": 1}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "part two"}], "turn": 1}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 2);
        let blocks = msgs[1].content.as_array().unwrap();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn user_turn_supersedes_pending_results() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "use tool"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "T", "input": {}}],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "R"}),
            ),
            ev(EventType::MessageUser, json!({"content": "never mind"})),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        // user, assistant(tool_use), user — the pending result is discarded.
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2].role, "user");
        assert_eq!(msgs[2].content, "never mind");
    }

    // ── Agentic loop ─────────────────────────────────────────────────

    #[test]
    fn agentic_loop_flushes_between_turns() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "start"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "T1", "input": {}}],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "R1"}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c2", "name": "T2", "input": {}}],
                    "turn": 2,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c2", "content": "R2"}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "done"}], "turn": 3}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        let roles: Vec<&str> = msgs.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(
            roles,
            ["user", "assistant", "user", "assistant", "user", "assistant"]
        );
        assert_eq!(msgs[2].content[0]["tool_use_id"], "c1");
        assert_eq!(msgs[4].content[0]["tool_use_id"], "c2");
    }

    #[test]
    fn multiple_results_flush_into_one_user_message() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "parallel"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [
                        {"type": "tool_use", "id": "c1", "name": "T1", "input": {}},
                        {"type": "tool_use", "id": "c2", "name": "T2", "input": {}}
                    ],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "R1", "isError": false}),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c2", "content": "R2", "isError": true}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "done"}], "turn": 2}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 4);
        let blocks = msgs[2].content.as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["tool_use_id"], "c1");
        assert_eq!(blocks[1]["tool_use_id"], "c2");
        assert_eq!(blocks[1]["is_error"], true);
    }

    #[test]
    fn case_b_flushes_results_that_arrived_early() {
        // Results recorded before the assistant message that contains the
        // tool_use (out-of-order persistence after a context clear).
        let events = vec![
            session_start(),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "early"}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "T", "input": {}}],
                    "turn": 1,
                }),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "assistant");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content[0]["tool_use_id"], "c1");
    }

    // ── Token usage ──────────────────────────────────────────────────

    #[test]
    fn token_usage_accumulates_across_messages() {
        let events = vec![
            session_start(),
            ev(
                EventType::MessageUser,
                json!({"content": "a", "tokenUsage": {"inputTokens": 5, "outputTokens": 0}}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "text", "text": "b"}],
                    "turn": 1,
                    "tokenUsage": {"inputTokens": 100, "outputTokens": 50, "cacheReadTokens": 10},
                }),
            ),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "text", "text": "c"}],
                    "turn": 2,
                    "tokenUsage": {"inputTokens": 150, "outputTokens": 75, "cacheCreationTokens": 20},
                }),
            ),
        ];
        let result = reconstruct_from_events(&events);

        assert_eq!(result.token_usage.input_tokens, 255);
        assert_eq!(result.token_usage.output_tokens, 125);
        assert_eq!(result.token_usage.cache_read_tokens, 10);
        assert_eq!(result.token_usage.cache_creation_tokens, 20);
    }

    // ── Truncated input restoration ──────────────────────────────────

    #[test]
    fn restores_truncated_tool_arguments() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "run"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{
                        "type": "tool_use",
                        "id": "c1",
                        "name": "BigTool",
                        "input": {"_truncated": true}
                    }],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolCall,
                json!({
                    "toolCallId": "c1",
                    "name": "BigTool",
                    "arguments": {"largeArg": "full value"}
                }),
            ),
            ev(
                EventType::ToolResult,
                json!({"toolCallId": "c1", "content": "done"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);

        let tool_use = &msgs[1].content[0];
        assert_eq!(tool_use["input"]["largeArg"], "full value");
        assert!(tool_use["input"].get("_truncated").is_none());
    }

    #[test]
    fn truncated_marker_kept_when_tool_call_absent() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "run"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{
                        "type": "tool_use",
                        "id": "c_legacy",
                        "name": "T",
                        "input": {"_truncated": true}
                    }],
                    "turn": 1,
                }),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);
        assert_eq!(msgs[1].content[0]["input"]["_truncated"], true);
    }

    #[test]
    fn non_truncated_input_unchanged() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "run"})),
            ev(
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "tool_use", "id": "c1", "name": "T", "input": {"arg": "v"}}],
                    "turn": 1,
                }),
            ),
            ev(
                EventType::ToolCall,
                json!({"toolCallId": "c1", "name": "T", "arguments": {"arg": "different"}}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);
        assert_eq!(msgs[1].content[0]["input"]["arg"], "v");
    }

    // ── Config state ─────────────────────────────────────────────────

    #[test]
    fn reasoning_level_last_wins() {
        let events = vec![
            session_start(),
            ev(EventType::ConfigReasoningLevel, json!({"newLevel": "low"})),
            ev(
                EventType::ConfigReasoningLevel,
                json!({"previousLevel": "low", "newLevel": "xhigh"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        assert_eq!(result.reasoning_level.as_deref(), Some("xhigh"));
    }

    #[test]
    fn system_prompt_from_session_start() {
        let events = vec![ev(
            EventType::SessionStart,
            json!({
                "workingDirectory": "/test",
                "model": "claude-opus-4-6",
                "systemPrompt": "You are a helpful assistant."
            }),
        )];
        let result = reconstruct_from_events(&events);
        assert_eq!(
            result.system_prompt.as_deref(),
            Some("You are a helpful assistant.")
        );
    }

    #[test]
    fn prompt_update_overrides_with_placeholder() {
        let events = vec![
            ev(
                EventType::SessionStart,
                json!({
                    "workingDirectory": "/test",
                    "model": "claude-opus-4-6",
                    "systemPrompt": "Original"
                }),
            ),
            ev(
                EventType::ConfigPromptUpdate,
                json!({"newHash": "abc123", "contentBlobId": "blob_1"}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        assert_eq!(
            result.system_prompt.as_deref(),
            Some("[Updated prompt - hash: abc123]")
        );
    }

    // ── Turn count ───────────────────────────────────────────────────

    #[test]
    fn turn_count_is_highest_seen() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({"content": "a"})),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "b"}], "turn": 5}),
            ),
            ev(
                EventType::MessageAssistant,
                json!({"content": [{"type": "text", "text": "c"}], "turn": 2}),
            ),
        ];
        let result = reconstruct_from_events(&events);
        assert_eq!(result.turn_count, 5);
    }

    // ── Unknown / ignored types ──────────────────────────────────────

    #[test]
    fn unknown_and_marker_events_are_ignored() {
        let events = vec![
            session_start(),
            ev(EventType::StreamTurnStart, json!({"turn": 1})),
            ev(EventType::StreamTurnEnd, json!({"turn": 1})),
            ev(EventType::Other("vendor.custom".into()), json!({"x": 1})),
            ev(EventType::SkillAdded, json!({"skillName": "s", "source": "project", "addedVia": "slash"})),
            ev(EventType::MessageUser, json!({"content": "hello"})),
        ];
        let result = reconstruct_from_events(&events);
        let msgs = get_messages(&result);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "hello");
    }

    #[test]
    fn malformed_payload_fields_are_tolerated() {
        let events = vec![
            session_start(),
            ev(EventType::MessageUser, json!({})),
            ev(EventType::ToolResult, json!({})),
            ev(EventType::MessageAssistant, json!({"turn": "not a number"})),
        ];
        // Must not panic; content defaults to null.
        let result = reconstruct_from_events(&events);
        assert_eq!(result.messages_with_event_ids.len(), 2);
        assert_eq!(result.turn_count, 0);
    }

    // ── Properties ───────────────────────────────────────────────────

    /// One step of a randomly generated session history.
    #[derive(Clone, Debug)]
    enum Op {
        User(u8),
        AssistantText(u8),
        AssistantToolUse,
        ToolResult,
        Compact,
        Clear,
        DeleteEarlier(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..50).prop_map(Op::User),
            (0u8..50).prop_map(Op::AssistantText),
            Just(Op::AssistantToolUse),
            Just(Op::ToolResult),
            Just(Op::Compact),
            Just(Op::Clear),
            (0u8..200).prop_map(Op::DeleteEarlier),
        ]
    }

    fn build_history(ops: &[Op]) -> Vec<SessionEvent> {
        let mut events = vec![session_start()];
        let mut tool_seq = 0u32;
        let mut last_tool = None;

        for (i, op) in ops.iter().enumerate() {
            let id = format!("evt_{i}");
            let event = match op {
                Op::User(n) => ev_with_id(
                    &id,
                    EventType::MessageUser,
                    json!({"content": format!("user {n}")}),
                ),
                Op::AssistantText(n) => ev_with_id(
                    &id,
                    EventType::MessageAssistant,
                    json!({
                        "content": [{"type": "text", "text": format!("answer {n}")}],
                        "turn": i as i64,
                        "tokenUsage": {"inputTokens": 1, "outputTokens": 1},
                    }),
                ),
                Op::AssistantToolUse => {
                    tool_seq += 1;
                    let tc = format!("toolu_{tool_seq}");
                    last_tool = Some(tc.clone());
                    ev_with_id(
                        &id,
                        EventType::MessageAssistant,
                        json!({
                            "content": [{"type": "tool_use", "id": tc, "name": "T", "input": {}}],
                            "turn": i as i64,
                        }),
                    )
                }
                Op::ToolResult => {
                    let tc = last_tool.clone().unwrap_or_else(|| "toolu_0".to_string());
                    ev_with_id(
                        &id,
                        EventType::ToolResult,
                        json!({"toolCallId": tc, "content": "R"}),
                    )
                }
                Op::Compact => ev_with_id(
                    &id,
                    EventType::CompactSummary,
                    json!({"summary": "compacted", "boundaryEventId": "evt_b"}),
                ),
                Op::Clear => ev_with_id(&id, EventType::ContextCleared, json!({})),
                Op::DeleteEarlier(n) => {
                    let target = format!("evt_{}", *n as usize % (i + 1));
                    ev_with_id(
                        &id,
                        EventType::MessageDeleted,
                        json!({"targetEventId": target, "targetType": "message.user", "reason": "user_request"}),
                    )
                }
            };
            events.push(event);
        }
        events
    }

    proptest! {
        // Reconstruction is deterministic and idempotent.
        #[test]
        fn reconstruction_is_stable(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let events = build_history(&ops);
            let a = reconstruct_from_events(&events);
            let b = reconstruct_from_events(&events);
            prop_assert_eq!(a, b);
        }

        // Output roles strictly alternate: merging collapses same-role
        // neighbors, and flushes only ever insert a user after an assistant.
        #[test]
        fn roles_alternate(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let events = build_history(&ops);
            let result = reconstruct_from_events(&events);
            let msgs = &result.messages_with_event_ids;
            for w in msgs.windows(2) {
                prop_assert_ne!(&w[0].message.role, &w[1].message.role);
            }
            for entry in msgs {
                prop_assert!(entry.message.role == "user" || entry.message.role == "assistant");
                prop_assert!(!entry.event_ids.is_empty());
            }
        }
    }
}
