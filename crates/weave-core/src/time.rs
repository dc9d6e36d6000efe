//! Timestamp helpers.
//!
//! Every persisted row stores an ISO-8601 UTC string. Timestamps are
//! wall-clock: ordering within a session is guaranteed by sequence numbers,
//! not by the clock.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp produced by [`now_iso`].
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso_is_utc() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'), "expected UTC suffix, got: {ts}");
    }

    #[test]
    fn roundtrip() {
        let ts = now_iso();
        let parsed = parse_iso(&ts).unwrap();
        assert_eq!(parsed.to_rfc3339_opts(SecondsFormat::Millis, true), ts);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_iso("not a timestamp").is_none());
    }

    #[test]
    fn timestamps_do_not_regress() {
        let a = now_iso();
        let b = now_iso();
        assert!(a <= b, "clock went backwards: {a} > {b}");
    }
}
