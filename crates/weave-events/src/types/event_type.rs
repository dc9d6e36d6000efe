//! The [`EventType`] discriminator.
//!
//! The core set is closed; anything outside it is carried verbatim in the
//! [`EventType::Other`] variant so that events written by newer versions
//! survive a round-trip through an older store unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Event type discriminator stored in the `type` column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// `session.start` — root event of a fresh session.
    SessionStart,
    /// `session.fork` — root event of a forked session.
    SessionFork,
    /// `message.user`
    MessageUser,
    /// `message.assistant`
    MessageAssistant,
    /// `message.deleted` — tombstone referencing a target event.
    MessageDeleted,
    /// `tool.call` — authoritative tool arguments.
    ToolCall,
    /// `tool.result`
    ToolResult,
    /// `compact.boundary`
    CompactBoundary,
    /// `compact.summary` — compaction point seen by reconstruction.
    CompactSummary,
    /// `context.cleared` — hard context reset.
    ContextCleared,
    /// `config.model_switch`
    ConfigModelSwitch,
    /// `config.reasoning_level`
    ConfigReasoningLevel,
    /// `config.prompt_update`
    ConfigPromptUpdate,
    /// `skill.added`
    SkillAdded,
    /// `skill.removed`
    SkillRemoved,
    /// `memory.ledger`
    MemoryLedger,
    /// `plan.mode_entered`
    PlanModeEntered,
    /// `plan.mode_exited`
    PlanModeExited,
    /// `plan.created`
    PlanCreated,
    /// `stream.turn_start`
    StreamTurnStart,
    /// `stream.turn_end`
    StreamTurnEnd,
    /// Any type outside the core set, preserved verbatim.
    Other(String),
}

/// All core (non-`Other`) event types.
pub const ALL_EVENT_TYPES: [EventType; 21] = [
    EventType::SessionStart,
    EventType::SessionFork,
    EventType::MessageUser,
    EventType::MessageAssistant,
    EventType::MessageDeleted,
    EventType::ToolCall,
    EventType::ToolResult,
    EventType::CompactBoundary,
    EventType::CompactSummary,
    EventType::ContextCleared,
    EventType::ConfigModelSwitch,
    EventType::ConfigReasoningLevel,
    EventType::ConfigPromptUpdate,
    EventType::SkillAdded,
    EventType::SkillRemoved,
    EventType::MemoryLedger,
    EventType::PlanModeEntered,
    EventType::PlanModeExited,
    EventType::PlanCreated,
    EventType::StreamTurnStart,
    EventType::StreamTurnEnd,
];

impl EventType {
    /// The wire string for this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionStart => "session.start",
            Self::SessionFork => "session.fork",
            Self::MessageUser => "message.user",
            Self::MessageAssistant => "message.assistant",
            Self::MessageDeleted => "message.deleted",
            Self::ToolCall => "tool.call",
            Self::ToolResult => "tool.result",
            Self::CompactBoundary => "compact.boundary",
            Self::CompactSummary => "compact.summary",
            Self::ContextCleared => "context.cleared",
            Self::ConfigModelSwitch => "config.model_switch",
            Self::ConfigReasoningLevel => "config.reasoning_level",
            Self::ConfigPromptUpdate => "config.prompt_update",
            Self::SkillAdded => "skill.added",
            Self::SkillRemoved => "skill.removed",
            Self::MemoryLedger => "memory.ledger",
            Self::PlanModeEntered => "plan.mode_entered",
            Self::PlanModeExited => "plan.mode_exited",
            Self::PlanCreated => "plan.created",
            Self::StreamTurnStart => "stream.turn_start",
            Self::StreamTurnEnd => "stream.turn_end",
            Self::Other(s) => s,
        }
    }

    /// Whether this type counts toward the session's message counter.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::MessageUser | Self::MessageAssistant)
    }

    /// Whether a `message.deleted` tombstone may target this type.
    pub fn is_deletable(&self) -> bool {
        matches!(
            self,
            Self::MessageUser | Self::MessageAssistant | Self::ToolResult
        )
    }

    /// Whether this type is a session root (`parent_id` may be absent).
    pub fn is_root(&self) -> bool {
        matches!(self, Self::SessionStart | Self::SessionFork)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "session.start" => Self::SessionStart,
            "session.fork" => Self::SessionFork,
            "message.user" => Self::MessageUser,
            "message.assistant" => Self::MessageAssistant,
            "message.deleted" => Self::MessageDeleted,
            "tool.call" => Self::ToolCall,
            "tool.result" => Self::ToolResult,
            "compact.boundary" => Self::CompactBoundary,
            "compact.summary" => Self::CompactSummary,
            "context.cleared" => Self::ContextCleared,
            "config.model_switch" => Self::ConfigModelSwitch,
            "config.reasoning_level" => Self::ConfigReasoningLevel,
            "config.prompt_update" => Self::ConfigPromptUpdate,
            "skill.added" => Self::SkillAdded,
            "skill.removed" => Self::SkillRemoved,
            "memory.ledger" => Self::MemoryLedger,
            "plan.mode_entered" => Self::PlanModeEntered,
            "plan.mode_exited" => Self::PlanModeExited,
            "plan.created" => Self::PlanCreated,
            "stream.turn_start" => Self::StreamTurnStart,
            "stream.turn_end" => Self::StreamTurnEnd,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}
