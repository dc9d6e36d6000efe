//! Compaction event payloads: boundary, summary.

use serde::{Deserialize, Serialize};

/// Payload for `compact.boundary` events.
///
/// Marks the last event covered by a subsequent `compact.summary`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactBoundaryPayload {
    /// Event ID at the boundary of the compacted range.
    pub boundary_event_id: String,
}

/// Payload for `compact.summary` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSummaryPayload {
    /// Compacted summary text.
    pub summary: String,
    /// Event ID of the corresponding boundary event.
    pub boundary_event_id: String,
}
