//! Streaming turn marker payloads.

use serde::{Deserialize, Serialize};

/// Payload for `stream.turn_start` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTurnStartPayload {
    /// Turn number being started.
    pub turn: i64,
}

/// Payload for `stream.turn_end` events.
///
/// Absence of a `stream.turn_end` after the last assistant message is how
/// an interrupted session is detected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTurnEndPayload {
    /// Turn number being finished.
    pub turn: i64,
}
