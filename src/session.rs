//! Session-scoped state.
//!
//! This module provides the pieces the gate needs from the session layer:
//! - [`SessionId`]: opaque identifier carried by a request.
//! - [`SessionStore`]: the store contract (per-session key/value attributes).
//! - [`RecordMap`]: the per-session table of route → last-call timestamp.
//!
//! The gate treats the store as an external collaborator. Stores are free to hand
//! out snapshots on read, so the gate always writes the record map back after
//! mutating it.

use std::fmt;

pub mod record;
pub mod store;
pub use record::{RecordMap, RECORD_ATTRIBUTE};
pub use store::{InMemorySessionStore, SessionStore, StoreError};

/// Opaque session identifier issued by a [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Issue a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the session identifier named `cookie_name` from a `Cookie` header value.
    ///
    /// ```
    /// use sessiongate::SessionId;
    /// let id = SessionId::from_cookie_header("theme=dark; SESSION=abc123", "SESSION");
    /// assert_eq!(id.unwrap().as_str(), "abc123");
    /// ```
    pub fn from_cookie_header(header: &str, cookie_name: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == cookie_name)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
