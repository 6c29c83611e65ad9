//! Debounce gate: per-session, per-route minimum interval enforcement.
//!
//! The gate answers one question before a protected operation runs: has this session
//! called this route too recently? State machine per (session, route):
//!
//! ```text
//! NO_RECORD       --call-->                    RECORDED(now)   ALLOW
//! RECORDED(last)  --call, now-last >= T-->     RECORDED(now)   ALLOW
//! RECORDED(last)  --call, now-last <  T-->     RECORDED(now)   REJECT(last + T - now)
//! ```
//!
//! The last transition is [`RejectionMode::Advance`]; under the default
//! [`RejectionMode::Hold`] it keeps `RECORDED(last)` instead.
//!
//! The gate fails open. Missing policy, disabled policy, anonymous requests and any fault
//! while touching session state all let the call through; only [`Debounced`] is surfaced.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Debounced, StateError};
use crate::policy::{PolicyResolver, PolicyTable};
use crate::session::{RecordMap, SessionId, SessionStore, RECORD_ATTRIBUTE};

mod locks;

use locks::SessionLocks;

/// Outcome of the pure window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Outside the window (or first call).
    Allow,
    /// Inside the window.
    Reject {
        /// Milliseconds until the window closes.
        remaining_ms: u64,
    },
}

/// Decide whether a call at `now` is allowed given the route's last call.
///
/// A `last` later than `now` (clock skew between concurrent readers) counts as zero
/// elapsed time.
pub fn decide(last: Option<u64>, now: u64, interval_ms: u64) -> Decision {
    match last {
        None => Decision::Allow,
        Some(last) => {
            let elapsed = now.saturating_sub(last);
            if elapsed >= interval_ms {
                Decision::Allow
            } else {
                Decision::Reject { remaining_ms: interval_ms - elapsed }
            }
        }
    }
}

/// What a rejected call does to the stored timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionMode {
    /// Leave the record untouched; the original deadline stands.
    #[default]
    Hold,
    /// Advance the record to the rejected call's time; rapid retries keep pushing the
    /// window out.
    Advance,
}

/// Why the gate let a call through without consulting the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// No policy attached to the route.
    NoPolicy,
    /// Policy interval is zero or negative.
    Disabled,
    /// Request carries no live session.
    NoSession,
    /// Reading or writing debounce state failed.
    Fault,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoPolicy => "no_policy",
            Self::Disabled => "disabled",
            Self::NoSession => "no_session",
            Self::Fault => "fault",
        };
        f.write_str(label)
    }
}

/// Result of running the gate for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Window check passed and the record was updated.
    Allowed,
    /// Gate did not apply; nothing was recorded.
    Bypassed(BypassReason),
    /// Call arrived inside the window.
    Rejected(Debounced),
}

impl Verdict {
    /// True only when the window check ran and accepted the call.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// True when the protected operation may proceed (allowed or bypassed).
    pub fn lets_through(&self) -> bool {
        !self.is_rejected()
    }

    /// True when the call arrived inside the window.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Convert into the rejection signal.
    pub fn into_result(self) -> Result<(), Debounced> {
        match self {
            Self::Rejected(rejection) => Err(rejection),
            Self::Allowed | Self::Bypassed(_) => Ok(()),
        }
    }
}

/// Per-session debounce gate.
///
/// Clones share the same store, policies and lock table.
pub struct DebounceGate<S> {
    store: Arc<S>,
    policies: Arc<dyn PolicyResolver>,
    clock: Arc<dyn Clock>,
    mode: RejectionMode,
    locks: Arc<SessionLocks>,
}

impl<S> Clone for DebounceGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policies: self.policies.clone(),
            clock: self.clock.clone(),
            mode: self.mode,
            locks: self.locks.clone(),
        }
    }
}

impl<S> fmt::Debug for DebounceGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceGate")
            .field("policies", &self.policies)
            .field("clock", &self.clock)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<S> DebounceGate<S>
where
    S: SessionStore + 'static,
{
    /// Gate over `store` using `policies`, the system clock and [`RejectionMode::Hold`].
    pub fn new<P: PolicyResolver + 'static>(store: S, policies: P) -> Self {
        Self::builder(store).policies(policies).build()
    }

    /// Start configuring a gate over `store`.
    pub fn builder(store: S) -> GateBuilder<S> {
        GateBuilder {
            store: Arc::new(store),
            policies: Arc::new(PolicyTable::default()),
            clock: Arc::new(SystemClock),
            mode: RejectionMode::default(),
        }
    }

    /// Configured rejection mode.
    pub fn rejection_mode(&self) -> RejectionMode {
        self.mode
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run the gate for a call to `route` from `session`.
    pub async fn check(&self, route: &str, session: Option<&SessionId>) -> Verdict {
        let Some(policy) = self.policies.resolve(route) else {
            return Verdict::Bypassed(BypassReason::NoPolicy);
        };
        let Some(interval_ms) = policy.enabled_interval() else {
            warn!(
                target: "sessiongate::gate",
                route,
                interval_ms = policy.interval_ms(),
                "debounce interval must be > 0; route left unprotected"
            );
            return Verdict::Bypassed(BypassReason::Disabled);
        };
        let Some(session) = session else {
            debug!(target: "sessiongate::gate", route, "no session; debounce bypassed");
            return Verdict::Bypassed(BypassReason::NoSession);
        };

        match self.record_call(route, session, interval_ms).await {
            Ok(Some(verdict)) => verdict,
            Ok(None) => {
                debug!(target: "sessiongate::gate", route, session = %session, "session not live; debounce bypassed");
                Verdict::Bypassed(BypassReason::NoSession)
            }
            Err(fault) => {
                error!(
                    target: "sessiongate::gate",
                    route,
                    session = %session,
                    error = %fault,
                    "debounce state unavailable; failing open"
                );
                Verdict::Bypassed(BypassReason::Fault)
            }
        }
    }

    /// Like [`check`](Self::check), but yields the rejection signal as an error.
    pub async fn enforce(&self, route: &str, session: Option<&SessionId>) -> Result<(), Debounced> {
        self.check(route, session).await.into_result()
    }

    /// Release per-session bookkeeping once the store has destroyed `session`.
    ///
    /// A lock still held by an in-flight request survives until that request finishes.
    pub fn forget(&self, session: &SessionId) {
        self.locks.forget(session);
    }

    // Re-fetch, decide and write back under the session's lock. The first request to
    // take the lock on a fresh session publishes the map; competitors queued behind it
    // observe the published map on their own re-fetch.
    async fn record_call(
        &self,
        route: &str,
        session: &SessionId,
        interval_ms: u64,
    ) -> Result<Option<Verdict>, StateError> {
        if !self.store.exists(session).await.map_err(StateError::store)? {
            return Ok(None);
        }

        let lock = self.locks.handle(session);
        let _guard = lock.lock().await;

        let now = self.clock.now_millis();
        let stored = match self.store.get_attribute(session, RECORD_ATTRIBUTE).await {
            Ok(stored) => stored,
            Err(err) if S::is_missing_session(&err) => return Ok(None),
            Err(err) => return Err(StateError::store(err)),
        };
        let mut records = match stored {
            Some(value) => RecordMap::from_value(value)?,
            None => {
                debug!(target: "sessiongate::gate", session = %session, "first protected call; publishing record map");
                RecordMap::new()
            }
        };

        let verdict = match decide(records.last_call(route), now, interval_ms) {
            Decision::Allow => {
                records.record(route, now);
                Verdict::Allowed
            }
            Decision::Reject { remaining_ms } => {
                info!(
                    target: "sessiongate::gate",
                    route,
                    session = %session,
                    remaining_ms,
                    interval_ms,
                    "call debounced"
                );
                let rejected = Verdict::Rejected(Debounced::new(route, interval_ms, remaining_ms));
                if self.mode == RejectionMode::Hold {
                    return Ok(Some(rejected));
                }
                records.record(route, now);
                rejected
            }
        };

        match self.store.set_attribute(session, RECORD_ATTRIBUTE, records.to_value()?).await {
            Ok(()) => Ok(Some(verdict)),
            // Session destroyed between the liveness check and the write-back.
            Err(err) if S::is_missing_session(&err) => Ok(None),
            Err(err) => Err(StateError::store(err)),
        }
    }
}

/// Builder for [`DebounceGate`].
pub struct GateBuilder<S> {
    store: Arc<S>,
    policies: Arc<dyn PolicyResolver>,
    clock: Arc<dyn Clock>,
    mode: RejectionMode,
}

impl<S> GateBuilder<S> {
    /// Route policies to enforce. Defaults to an empty table (nothing protected).
    pub fn policies<P: PolicyResolver + 'static>(mut self, policies: P) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// What a rejection does to the stored timestamp.
    pub fn rejection_mode(mut self, mode: RejectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> DebounceGate<S> {
        DebounceGate {
            store: self.store,
            policies: self.policies,
            clock: self.clock,
            mode: self.mode,
            locks: Arc::new(SessionLocks::default()),
        }
    }
}
