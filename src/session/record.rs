use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session attribute under which the record map is stored.
pub const RECORD_ATTRIBUTE: &str = "DEBOUNCE_RECORDS";

/// Per-session table of route → last-call timestamp (ms since epoch).
///
/// Serialized as a plain JSON object so any store that can hold JSON values can hold it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMap {
    last_calls: HashMap<String, u64>,
}

impl RecordMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded call for `route`, if any.
    pub fn last_call(&self, route: &str) -> Option<u64> {
        self.last_calls.get(route).copied()
    }

    /// Record a call to `route` at `at_millis`.
    ///
    /// Never moves a timestamp backward: when a concurrent request already stored a
    /// later instant, that instant is kept.
    pub fn record(&mut self, route: &str, at_millis: u64) {
        let slot = self.last_calls.entry(route.to_owned()).or_insert(at_millis);
        *slot = (*slot).max(at_millis);
    }

    /// Number of routes with a recorded call.
    pub fn len(&self) -> usize {
        self.last_calls.len()
    }

    /// True when no route has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.last_calls.is_empty()
    }

    /// Decode a map previously stored with [`RecordMap::to_value`].
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode for storage as a session attribute.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
