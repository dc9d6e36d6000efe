//! Skill lifecycle payloads.

use serde::{Deserialize, Serialize};

/// Payload for `skill.added` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAddedPayload {
    /// Skill name.
    pub skill_name: String,
    /// Where the skill came from (builtin, project, user, …).
    pub source: String,
    /// How the skill was attached (slash command, auto-load, …).
    pub added_via: String,
}

/// Payload for `skill.removed` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRemovedPayload {
    /// Skill name.
    pub skill_name: String,
}
