//! Error types for the debounce gate
use std::fmt;
use std::time::Duration;

/// Kind name reported to clients for a debounce rejection.
pub const DEBOUNCED_KIND: &str = "Debounced";

/// Rejection signal raised when a call arrives inside its route's debounce window.
///
/// This is the one failure the gate surfaces; everything else fails open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounced {
    route: String,
    interval_ms: u64,
    remaining_ms: u64,
}

impl Debounced {
    /// Build a rejection for `route`.
    pub fn new(route: impl Into<String>, interval_ms: u64, remaining_ms: u64) -> Self {
        Self { route: route.into(), interval_ms, remaining_ms }
    }

    /// Route that was rejected.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Configured minimum interval for the route.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Milliseconds the caller must wait before the route is callable again.
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Remaining wait as a `Duration`.
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms)
    }

    /// Error kind name used by the response translation.
    pub fn kind(&self) -> &'static str {
        DEBOUNCED_KIND
    }
}

impl fmt::Display for Debounced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "too many requests to '{}': retry in {}ms (minimum interval {}ms)",
            self.route, self.remaining_ms, self.interval_ms
        )
    }
}

impl std::error::Error for Debounced {}

/// Unified error type for services wrapped by the debounce layer
#[derive(Debug, Clone)]
pub enum GateError<E> {
    /// The gate rejected the call
    Debounced(Debounced),
    /// The underlying service failed
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debounced(rejection) => write!(f, "{}", rejection),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Debounced(_) => None,
        }
    }
}

impl<E> From<Debounced> for GateError<E> {
    fn from(rejection: Debounced) -> Self {
        Self::Debounced(rejection)
    }
}

impl<E> GateError<E> {
    /// Check if this error is a debounce rejection
    pub fn is_debounced(&self) -> bool {
        matches!(self, Self::Debounced(_))
    }
    /// Borrow the rejection if present.
    pub fn debounced(&self) -> Option<&Debounced> {
        match self {
            Self::Debounced(rejection) => Some(rejection),
            _ => None,
        }
    }
    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Internal faults raised while reading or writing debounce state.
///
/// The gate never surfaces these; they are logged and the call is let through.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The session store failed.
    #[error("session store failure: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The stored record map could not be decoded or encoded.
    #[error("malformed debounce record: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StateError {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
