//! Memory ledger query API.
//!
//! `memory.ledger` events are the agent's long-term memory: structured
//! records written at task boundaries. This module provides the read side —
//! listing and searching ledger entries per workspace — on top of the
//! [`EventStore`].
//!
//! When FTS is available and the caller supplies a query, matches are
//! restricted to `memory.ledger` events. Without FTS the query term is
//! ignored and all ledger entries are returned (the LIKE fallback is too
//! imprecise for memory recall).

use serde_json::Value;

use crate::errors::Result;
use crate::sqlite::repositories::search::{SEARCH_LIMIT_CAP, SearchOptions};
use crate::sqlite::row_types::EventRow;
use crate::store::EventStore;
use crate::types::EventType;
use crate::types::payloads::memory::MemoryLedgerPayload;

/// Title used for entries whose payload could not be parsed.
pub const LEDGER_PARSE_FAILURE_TITLE: &str = "[could not parse ledger entry]";

const LEDGER_TYPE: &str = "memory.ledger";

/// Options for querying the ledger.
#[derive(Default)]
pub struct LedgerQueryOptions<'a> {
    /// Restrict to one session.
    pub session_id: Option<&'a str>,
    /// Full-text query. Ignored when FTS is unavailable.
    pub query: Option<&'a str>,
    /// Maximum entries (clamped to the shared 500 cap).
    pub limit: Option<i64>,
}

/// A ledger entry with its event provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    /// Source event ID.
    pub event_id: String,
    /// Session the entry was written in.
    pub session_id: String,
    /// Timestamp of the entry.
    pub timestamp: String,
    /// Parsed payload. Parse failures yield a marker entry titled
    /// [`LEDGER_PARSE_FAILURE_TITLE`] instead of an error.
    pub entry: MemoryLedgerPayload,
}

/// Append a `memory.ledger` event to a session.
pub fn append_ledger_entry(
    store: &EventStore,
    session_id: &str,
    entry: &MemoryLedgerPayload,
) -> Result<EventRow> {
    store.append(&crate::store::AppendOptions {
        session_id,
        event_type: EventType::MemoryLedger,
        payload: serde_json::to_value(entry)?,
        parent_id: None,
    })
}

/// Query ledger entries for a workspace, newest first.
pub fn query_ledger(
    store: &EventStore,
    workspace_id: &str,
    opts: &LedgerQueryOptions<'_>,
) -> Result<Vec<LedgerEntry>> {
    let limit = opts.limit.map_or(SEARCH_LIMIT_CAP, |l| l.clamp(1, SEARCH_LIMIT_CAP));

    let rows = match opts.query {
        Some(query) if store.fts_enabled() => {
            let types = [EventType::MemoryLedger];
            let hits = store.search(
                query,
                &SearchOptions {
                    workspace_id: Some(workspace_id),
                    session_id: opts.session_id,
                    types: Some(&types),
                    limit: Some(limit),
                },
            )?;
            let ids: Vec<&str> = hits.iter().map(|h| h.event_id.as_str()).collect();
            let mut by_id = store.get_events_by_ids(&ids)?;
            // Preserve relevance order from the search.
            hits.iter()
                .filter_map(|h| by_id.remove(&h.event_id))
                .collect()
        }
        _ => match opts.session_id {
            Some(session_id) => {
                let mut rows = store.get_events_by_type(session_id, &[LEDGER_TYPE], None)?;
                rows.reverse();
                rows.truncate(limit as usize);
                rows
            }
            None => store.get_events_by_workspace_and_types(
                workspace_id,
                &[LEDGER_TYPE],
                Some(limit),
                None,
            )?,
        },
    };

    Ok(rows.iter().map(parse_entry).collect())
}

fn parse_entry(row: &EventRow) -> LedgerEntry {
    let entry = serde_json::from_str::<Value>(&row.payload)
        .ok()
        .and_then(|v| serde_json::from_value::<MemoryLedgerPayload>(v).ok())
        .unwrap_or_else(|| MemoryLedgerPayload {
            title: LEDGER_PARSE_FAILURE_TITLE.to_string(),
            ..Default::default()
        });

    LedgerEntry {
        event_id: row.id.clone(),
        session_id: row.session_id.clone(),
        timestamp: row.timestamp.clone(),
        entry,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
