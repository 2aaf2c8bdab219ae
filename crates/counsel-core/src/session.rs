//! Session identity.
//!
//! A session is one run of the client. Its conversation lives in
//! session-scoped storage, so resuming the same id after a restart brings
//! the conversation back.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a user-supplied id.
    ///
    /// The id becomes a directory name, so it must be a single normal path
    /// component.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        validate_path_component(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reject empty strings, separators, `.`/`..` and anything else that is not
/// exactly one normal path component.
pub(crate) fn validate_path_component(component: &str) -> Result<(), String> {
    if component.is_empty() {
        return Err("Path component cannot be empty".to_string());
    }

    let mut components = Path::new(component).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(format!("Invalid path component: {component}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod session_id {
        use super::*;

        #[test]
        fn new_generates_unique_ids() {
            let id1 = SessionId::new();
            let id2 = SessionId::new();
            assert_ne!(id1, id2);
        }

        #[test]
        fn display_shows_inner_string() {
            let id = SessionId("test-session-123".to_string());
            assert_eq!(format!("{}", id), "test-session-123");
        }

        #[test]
        fn parse_accepts_plain_names() {
            let id = SessionId::parse("  morning-case ").unwrap();
            assert_eq!(id.as_str(), "morning-case");
        }

        #[test]
        fn parse_rejects_traversal() {
            assert!(SessionId::parse("..").is_err());
            assert!(SessionId::parse("a/b").is_err());
            assert!(SessionId::parse("").is_err());
            assert!(SessionId::parse("   ").is_err());
        }

        #[test]
        fn serialization_roundtrip() {
            let id = SessionId("test-session-456".to_string());
            let json = serde_json::to_string(&id).unwrap();
            let deserialized: SessionId = serde_json::from_str(&json).unwrap();
            assert_eq!(id, deserialized);
        }
    }
}
