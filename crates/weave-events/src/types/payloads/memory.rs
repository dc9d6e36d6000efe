//! Memory ledger payloads.

use serde::{Deserialize, Serialize};

/// Payload for `memory.ledger` events.
///
/// Written by the agent's memory subsystem at natural task boundaries.
/// Everything beyond the title is optional — older writers omit fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLedgerPayload {
    /// Entry title.
    pub title: String,
    /// Entry type (task, decision, note, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    /// Completion status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Original user input/request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Actions taken.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Files touched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<LedgerFileEntry>,
    /// Lessons learned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lessons: Vec<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// File entry in a ledger record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerFileEntry {
    /// File path.
    pub path: String,
    /// Operation: C (create), M (modify), D (delete).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    /// Purpose description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_entry_parses() {
        let payload: MemoryLedgerPayload =
            serde_json::from_value(json!({"title": "Fixed the build"})).unwrap();
        assert_eq!(payload.title, "Fixed the build");
        assert!(payload.actions.is_empty());
        assert!(payload.tags.is_empty());
    }

    #[test]
    fn full_entry_roundtrips() {
        let payload = MemoryLedgerPayload {
            title: "Refactor".into(),
            entry_type: Some("task".into()),
            status: Some("done".into()),
            input: Some("clean up the parser".into()),
            actions: vec!["extracted helper".into()],
            files: vec![LedgerFileEntry {
                path: "src/parse.rs".into(),
                op: Some("M".into()),
                why: Some("split giant match".into()),
            }],
            lessons: vec!["prefer small passes".into()],
            tags: vec!["parser".into()],
        };
        let json = serde_json::to_value(&payload).unwrap();
        let back: MemoryLedgerPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
