use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::SessionId;

/// Abstract session storage (per-session key/value attributes).
///
/// Values are JSON so stores may snapshot, serialize or ship them elsewhere. Callers must
/// not assume that mutating a value obtained from [`SessionStore::get_attribute`] changes
/// what the store holds; write it back with [`SessionStore::set_attribute`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the session currently exists (not expired or invalidated).
    async fn exists(&self, session: &SessionId) -> Result<bool, Self::Error>;

    /// Fetch a snapshot of an attribute.
    async fn get_attribute(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<Value>, Self::Error>;

    /// Store an attribute, replacing any previous value.
    async fn set_attribute(
        &self,
        session: &SessionId,
        key: &str,
        value: Value,
    ) -> Result<(), Self::Error>;

    /// Whether `error` means the session vanished (expired or invalidated) mid-call.
    ///
    /// The gate treats such errors as "no session" rather than as a store fault.
    fn is_missing_session(_error: &Self::Error) -> bool {
        false
    }
}

/// Errors from the in-memory session store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The session was never created or has been invalidated.
    #[error("session '{0}' does not exist")]
    UnknownSession(String),
    /// A writer panicked while holding the store lock.
    #[error("session store lock poisoned")]
    Poisoned,
}

type Attributes = HashMap<String, Value>;

/// Simple in-memory session store.
///
/// Reads return clones, matching stores that snapshot values.
#[derive(Default, Clone, Debug)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Attributes>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new, empty session.
    pub fn create(&self) -> Result<SessionId, StoreError> {
        let id = SessionId::generate();
        self.insert(id.clone())?;
        Ok(id)
    }

    /// Register a session under a caller-chosen id. Existing attributes are kept.
    pub fn insert(&self, id: SessionId) -> Result<(), StoreError> {
        let mut guard = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        guard.entry(id).or_default();
        Ok(())
    }

    /// Destroy a session and every attribute it holds. Returns `false` if it was unknown.
    pub fn invalidate(&self, id: &SessionId) -> Result<bool, StoreError> {
        let mut guard = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.remove(id).is_some())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    type Error = StoreError;

    async fn exists(&self, session: &SessionId) -> Result<bool, Self::Error> {
        let guard = self.sessions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.contains_key(session))
    }

    async fn get_attribute(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<Value>, Self::Error> {
        let guard = self.sessions.read().map_err(|_| StoreError::Poisoned)?;
        let attributes =
            guard.get(session).ok_or_else(|| StoreError::UnknownSession(session.to_string()))?;
        Ok(attributes.get(key).cloned())
    }

    async fn set_attribute(
        &self,
        session: &SessionId,
        key: &str,
        value: Value,
    ) -> Result<(), Self::Error> {
        let mut guard = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        let attributes = guard
            .get_mut(session)
            .ok_or_else(|| StoreError::UnknownSession(session.to_string()))?;
        attributes.insert(key.to_owned(), value);
        Ok(())
    }

    fn is_missing_session(error: &Self::Error) -> bool {
        matches!(error, StoreError::UnknownSession(_))
    }
}
