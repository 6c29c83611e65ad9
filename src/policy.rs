//! Debounce policies and their attachment to routes.
//!
//! A policy is metadata about an operation, not per-session state: the dispatch layer
//! resolves it by route before the gate runs. Most routes have no policy at all.
//!
//! # Configuration
//!
//! Tables can be built in code or loaded from JSON. Intervals are in milliseconds and
//! must be `> 0` to enable debouncing; zero or negative values disable the route.
//!
//! ```
//! use sessiongate::{PolicyResolver, PolicyTable};
//!
//! let table = PolicyTable::from_json(r#"{ "routes": { "/debounce": 3000 } }"#).unwrap();
//! assert_eq!(table.resolve("/debounce").map(|p| p.interval_ms()), Some(3000));
//! assert!(table.resolve("/members").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dynamic::DynamicConfig;

/// Minimum interval between two accepted calls to one route within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebouncePolicy {
    interval_ms: i64,
}

impl DebouncePolicy {
    /// Policy with the given interval; `> 0` to enable.
    pub const fn new(interval_ms: i64) -> Self {
        Self { interval_ms }
    }

    /// Raw configured interval.
    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// True when the interval is positive.
    pub fn is_enabled(&self) -> bool {
        self.interval_ms > 0
    }

    /// The interval as an unsigned value, or `None` when disabled.
    pub fn enabled_interval(&self) -> Option<u64> {
        u64::try_from(self.interval_ms).ok().filter(|ms| *ms > 0)
    }
}

/// Errors produced when loading a policy table.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The configuration document is not valid JSON or has the wrong shape.
    #[error("invalid debounce policy configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A route key was empty.
    #[error("debounce policy route must not be empty")]
    EmptyRoute,
}

/// Resolves the policy attached to a route.
pub trait PolicyResolver: Send + Sync + std::fmt::Debug {
    /// Policy for `route`, or `None` when the route is unprotected.
    fn resolve(&self, route: &str) -> Option<DebouncePolicy>;
}

/// Static route → policy table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default)]
    routes: HashMap<String, DebouncePolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attach.
    pub fn with_route(mut self, route: impl Into<String>, interval_ms: i64) -> Self {
        self.insert(route, interval_ms);
        self
    }

    /// Attach (or replace) the policy for `route`. Returns the previous policy.
    pub fn insert(&mut self, route: impl Into<String>, interval_ms: i64) -> Option<DebouncePolicy> {
        self.routes.insert(route.into(), DebouncePolicy::new(interval_ms))
    }

    /// Detach the policy for `route`.
    pub fn remove(&mut self, route: &str) -> Option<DebouncePolicy> {
        self.routes.remove(route)
    }

    /// Parse a table from JSON of the form `{"routes": {"/path": 3000}}`.
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let table: Self = serde_json::from_str(raw)?;
        if table.routes.keys().any(|route| route.trim().is_empty()) {
            return Err(PolicyError::EmptyRoute);
        }
        Ok(table)
    }

    /// Routes with a policy attached, sorted.
    pub fn routes(&self) -> Vec<&str> {
        let mut routes: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        routes.sort_unstable();
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl PolicyResolver for PolicyTable {
    fn resolve(&self, route: &str) -> Option<DebouncePolicy> {
        self.routes.get(route).copied()
    }
}

impl DynamicConfig<PolicyTable> {
    /// Parse `raw` and publish it as the live table.
    ///
    /// On error the running table stays in force. Returns the table that was replaced.
    pub fn reload(&self, raw: &str) -> Result<Arc<PolicyTable>, PolicyError> {
        let table = PolicyTable::from_json(raw).map_err(|err| {
            warn!(
                target: "sessiongate::policy",
                error = %err,
                "policy reload rejected; keeping current table"
            );
            err
        })?;
        let routes = table.len();
        let previous = self.replace(table);
        info!(
            target: "sessiongate::policy",
            routes,
            previous = previous.len(),
            "policy table reloaded"
        );
        Ok(previous)
    }
}

/// Hot-reloadable table: every resolve reads the latest snapshot.
impl PolicyResolver for DynamicConfig<PolicyTable> {
    fn resolve(&self, route: &str) -> Option<DebouncePolicy> {
        self.snapshot().resolve(route)
    }
}
