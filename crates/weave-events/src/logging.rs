//! Asynchronous operational log writer.
//!
//! [`LogWriter`] drains records into the `logs` table on a background task
//! so that hot paths never block on log persistence. Records for one writer
//! are committed in submission order; delivery is fire-and-forget.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::sqlite::repositories::log::NewLogRecord;
use crate::store::EventStore;

/// Log severity levels, numbered the way the wire clients expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Detailed diagnostics.
    Debug,
    /// Routine operation.
    Info,
    /// Unexpected but recoverable.
    Warn,
    /// Operation failed.
    Error,
}

impl LogLevel {
    /// Level name stored in the `level` column.
    pub fn name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Numeric level stored in the `level_num` column.
    pub fn num(self) -> i64 {
        match self {
            Self::Debug => 20,
            Self::Info => 30,
            Self::Warn => 40,
            Self::Error => 50,
        }
    }
}

/// Build a [`NewLogRecord`] for the given level.
pub fn record(
    level: LogLevel,
    component: &str,
    message: &str,
    session_id: Option<&str>,
) -> NewLogRecord {
    NewLogRecord {
        session_id: session_id.map(String::from),
        level: level.name().to_string(),
        level_num: level.num(),
        component: component.to_string(),
        message: message.to_string(),
        error_message: None,
        error_stack: None,
    }
}

enum LogJob {
    Write(NewLogRecord),
    Flush(oneshot::Sender<()>),
}

/// Background writer for the `logs` table.
pub struct LogWriter {
    tx: mpsc::UnboundedSender<LogJob>,
}

impl LogWriter {
    /// Spawn the writer task over the given store.
    pub fn spawn(store: Arc<EventStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _ = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    LogJob::Write(rec) => {
                        let store = Arc::clone(&store);
                        let result =
                            tokio::task::spawn_blocking(move || store.write_log(&rec)).await;
                        match result {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => warn!(error = %e, "failed to persist log record"),
                            Err(e) => warn!(error = %e, "log writer task panicked"),
                        }
                    }
                    LogJob::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    /// Submit a record. Fire-and-forget: failures are reported via `tracing`
    /// only.
    pub fn log(&self, record: NewLogRecord) {
        if self.tx.send(LogJob::Write(record)).is_err() {
            warn!("log writer is gone, dropping record");
        }
    }

    /// Wait until every record submitted so far has been persisted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(LogJob::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::ConnectionConfig;
    use crate::store::CreateSessionOptions;

    fn setup() -> (Arc<EventStore>, String) {
        let store = Arc::new(EventStore::open_in_memory(&ConnectionConfig::default()).unwrap());
        let sid = store
            .create_session(&CreateSessionOptions::new("/tmp/project", "claude-opus-4-6"))
            .unwrap()
            .session
            .id;
        (store, sid)
    }

    #[tokio::test]
    async fn writes_land_after_flush() {
        let (store, sid) = setup();
        let writer = LogWriter::spawn(Arc::clone(&store));

        writer.log(record(LogLevel::Info, "agent", "turn started", Some(&sid)));
        writer.log(record(LogLevel::Warn, "tools", "slow tool", Some(&sid)));
        writer.flush().await;

        let rows = store.get_logs_by_session(&sid, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message, "turn started");
        assert_eq!(rows[0].level_num, 30);
        assert_eq!(rows[1].level, "warn");
    }

    #[tokio::test]
    async fn submission_order_is_preserved() {
        let (store, sid) = setup();
        let writer = LogWriter::spawn(Arc::clone(&store));

        for i in 0..10 {
            writer.log(record(LogLevel::Debug, "test", &format!("msg {i}"), Some(&sid)));
        }
        writer.flush().await;

        let rows = store.get_logs_by_session(&sid, None).unwrap();
        let messages: Vec<&str> = rows.iter().map(|r| r.message.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("msg {i}")).collect();
        assert_eq!(messages, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn flush_on_fresh_writer_is_noop() {
        let (store, _sid) = setup();
        let writer = LogWriter::spawn(store);
        writer.flush().await;
    }

    #[test]
    fn level_numbers() {
        assert_eq!(LogLevel::Debug.num(), 20);
        assert_eq!(LogLevel::Info.num(), 30);
        assert_eq!(LogLevel::Warn.num(), 40);
        assert_eq!(LogLevel::Error.num(), 50);
        assert_eq!(LogLevel::Error.name(), "error");
    }
}
