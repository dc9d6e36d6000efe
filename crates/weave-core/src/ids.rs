//! Prefixed, typed entity ids.
//!
//! Ids follow the scheme `<prefix>_<32 hex>` — the hex part is a UUIDv7 in
//! simple (dashless) encoding, so ids are unique, unguessable, and sort in
//! creation order within a process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$doc:meta])* $name:ident, $prefix:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh id.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7().simple()))
            }

            /// Wrap an existing raw id string without validation.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id, returning the owned string.
            pub fn into_string(self) -> String {
                self.0
            }

            /// The prefix this id kind carries (without the underscore).
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

branded_id!(
    /// Id of a workspace (project directory).
    WorkspaceId,
    "ws"
);
branded_id!(
    /// Id of a session (one conversation).
    SessionId,
    "sess"
);
branded_id!(
    /// Id of a single event in a session's history.
    EventId,
    "evt"
);
branded_id!(
    /// Id of a content-addressed blob.
    BlobId,
    "blob"
);
branded_id!(
    /// Id correlating a tool invocation with its result.
    ToolCallId,
    "toolu"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(WorkspaceId::new().as_str().starts_with("ws_"));
        assert!(SessionId::new().as_str().starts_with("sess_"));
        assert!(EventId::new().as_str().starts_with("evt_"));
        assert!(BlobId::new().as_str().starts_with("blob_"));
        assert!(ToolCallId::new().as_str().starts_with("toolu_"));
    }

    #[test]
    fn hex_body_is_32_chars() {
        let id = EventId::new();
        let body = id.as_str().strip_prefix("evt_").unwrap();
        assert_eq!(body.len(), 32);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<EventId> = (0..100).map(|_| EventId::new()).collect();
        for w in ids.windows(2) {
            assert!(
                w[0].as_str() <= w[1].as_str(),
                "not monotonic: {} > {}",
                w[0],
                w[1]
            );
        }
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let id = BlobId::from_raw("blob_abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"blob_abc123\"");
        let back: BlobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = EventId::from_raw("evt_custom");
        assert_eq!(id.as_str(), "evt_custom");
        assert_eq!(id.into_string(), "evt_custom");
    }
}
