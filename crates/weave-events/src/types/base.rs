//! The [`SessionEvent`] struct — the core persisted event type.
//!
//! Events are stored as a flat struct with base fields at the top level and
//! a `payload` kept as opaque [`serde_json::Value`]. Typed access to the
//! payload is opt-in via [`SessionEvent::typed_payload()`], which dispatches
//! on [`EventType`] and deserializes into the matching payload struct.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event_type::EventType;
use super::payloads;

/// A persisted session event.
///
/// The wire format has base fields (`id`, `parentId`, `sessionId`, …) at the
/// top level and a `payload` JSON object that is validated structurally but
/// not interpreted at rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Unique event ID.
    pub id: String,
    /// Parent event ID (`None` only for session roots).
    pub parent_id: Option<String>,
    /// Session this event belongs to.
    pub session_id: String,
    /// Workspace this event belongs to.
    pub workspace_id: String,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Monotonic sequence number within the session, starting at 0.
    pub sequence: i64,
    /// Event-specific data (opaque JSON).
    pub payload: Value,
}

/// Typed payload enum for compile-time-safe access.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEventPayload {
    /// `session.start`
    SessionStart(payloads::session::SessionStartPayload),
    /// `session.fork`
    SessionFork(payloads::session::SessionForkPayload),
    /// `message.user`
    MessageUser(payloads::message::UserMessagePayload),
    /// `message.assistant`
    MessageAssistant(payloads::message::AssistantMessagePayload),
    /// `message.deleted`
    MessageDeleted(payloads::message_ops::MessageDeletedPayload),
    /// `tool.call`
    ToolCall(payloads::tool::ToolCallPayload),
    /// `tool.result`
    ToolResult(payloads::tool::ToolResultPayload),
    /// `compact.boundary`
    CompactBoundary(payloads::compact::CompactBoundaryPayload),
    /// `compact.summary`
    CompactSummary(payloads::compact::CompactSummaryPayload),
    /// `context.cleared`
    ContextCleared,
    /// `config.model_switch`
    ConfigModelSwitch(payloads::config::ConfigModelSwitchPayload),
    /// `config.reasoning_level`
    ConfigReasoningLevel(payloads::config::ConfigReasoningLevelPayload),
    /// `config.prompt_update`
    ConfigPromptUpdate(payloads::config::ConfigPromptUpdatePayload),
    /// `skill.added`
    SkillAdded(payloads::skill::SkillAddedPayload),
    /// `skill.removed`
    SkillRemoved(payloads::skill::SkillRemovedPayload),
    /// `memory.ledger`
    MemoryLedger(payloads::memory::MemoryLedgerPayload),
    /// `plan.mode_entered`
    PlanModeEntered(payloads::plan::PlanModeEnteredPayload),
    /// `plan.mode_exited`
    PlanModeExited(payloads::plan::PlanModeExitedPayload),
    /// `plan.created`
    PlanCreated(payloads::plan::PlanCreatedPayload),
    /// `stream.turn_start`
    StreamTurnStart(payloads::streaming::StreamTurnStartPayload),
    /// `stream.turn_end`
    StreamTurnEnd(payloads::streaming::StreamTurnEndPayload),
    /// Any type outside the core set — raw payload echoed back.
    Unknown(Value),
}

impl SessionEvent {
    /// Deserialize the payload into the typed variant matching
    /// [`event_type`](Self::event_type).
    ///
    /// Returns `Err` if the payload JSON doesn't match the expected shape.
    /// Unknown types never fail — they yield
    /// [`SessionEventPayload::Unknown`] with the raw payload.
    pub fn typed_payload(&self) -> std::result::Result<SessionEventPayload, serde_json::Error> {
        let p = &self.payload;
        Ok(match &self.event_type {
            EventType::SessionStart => {
                SessionEventPayload::SessionStart(serde_json::from_value(p.clone())?)
            }
            EventType::SessionFork => {
                SessionEventPayload::SessionFork(serde_json::from_value(p.clone())?)
            }
            EventType::MessageUser => {
                SessionEventPayload::MessageUser(serde_json::from_value(p.clone())?)
            }
            EventType::MessageAssistant => {
                SessionEventPayload::MessageAssistant(serde_json::from_value(p.clone())?)
            }
            EventType::MessageDeleted => {
                SessionEventPayload::MessageDeleted(serde_json::from_value(p.clone())?)
            }
            EventType::ToolCall => {
                SessionEventPayload::ToolCall(serde_json::from_value(p.clone())?)
            }
            EventType::ToolResult => {
                SessionEventPayload::ToolResult(serde_json::from_value(p.clone())?)
            }
            EventType::CompactBoundary => {
                SessionEventPayload::CompactBoundary(serde_json::from_value(p.clone())?)
            }
            EventType::CompactSummary => {
                SessionEventPayload::CompactSummary(serde_json::from_value(p.clone())?)
            }
            EventType::ContextCleared => SessionEventPayload::ContextCleared,
            EventType::ConfigModelSwitch => {
                SessionEventPayload::ConfigModelSwitch(serde_json::from_value(p.clone())?)
            }
            EventType::ConfigReasoningLevel => {
                SessionEventPayload::ConfigReasoningLevel(serde_json::from_value(p.clone())?)
            }
            EventType::ConfigPromptUpdate => {
                SessionEventPayload::ConfigPromptUpdate(serde_json::from_value(p.clone())?)
            }
            EventType::SkillAdded => {
                SessionEventPayload::SkillAdded(serde_json::from_value(p.clone())?)
            }
            EventType::SkillRemoved => {
                SessionEventPayload::SkillRemoved(serde_json::from_value(p.clone())?)
            }
            EventType::MemoryLedger => {
                SessionEventPayload::MemoryLedger(serde_json::from_value(p.clone())?)
            }
            EventType::PlanModeEntered => {
                SessionEventPayload::PlanModeEntered(serde_json::from_value(p.clone())?)
            }
            EventType::PlanModeExited => {
                SessionEventPayload::PlanModeExited(serde_json::from_value(p.clone())?)
            }
            EventType::PlanCreated => {
                SessionEventPayload::PlanCreated(serde_json::from_value(p.clone())?)
            }
            EventType::StreamTurnStart => {
                SessionEventPayload::StreamTurnStart(serde_json::from_value(p.clone())?)
            }
            EventType::StreamTurnEnd => {
                SessionEventPayload::StreamTurnEnd(serde_json::from_value(p.clone())?)
            }
            EventType::Other(_) => SessionEventPayload::Unknown(p.clone()),
        })
    }
}
