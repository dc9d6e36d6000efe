//! Plan mode payloads.

use serde::{Deserialize, Serialize};

/// Payload for `plan.mode_entered` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanModeEnteredPayload {
    /// Skill that initiated plan mode.
    pub skill_name: String,
    /// Tools blocked while planning.
    #[serde(default)]
    pub blocked_tools: Vec<String>,
}

/// How plan mode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanExitReason {
    /// User approved the plan.
    Approved,
    /// User cancelled planning.
    Cancelled,
    /// Plan mode timed out.
    Timeout,
}

/// Payload for `plan.mode_exited` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanModeExitedPayload {
    /// Exit reason.
    pub reason: PlanExitReason,
    /// Path of the plan file, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<String>,
}

/// Payload for `plan.created` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCreatedPayload {
    /// Absolute path of the plan file.
    pub plan_path: String,
    /// Plan title.
    pub title: String,
    /// Content hash in `sha256:…` form.
    pub content_hash: String,
    /// Approximate token count of the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<i64>,
}
