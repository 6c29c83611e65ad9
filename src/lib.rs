#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # sessiongate
//!
//! Per-session request debounce for tower services: stop a client from re-invoking a
//! protected route before a minimum interval has passed since its last call *in the same
//! session*.
//!
//! ## Features
//!
//! - **Route policies** resolved per request from a (hot-reloadable) table
//! - **Session-scoped records** stored through a pluggable [`SessionStore`]
//! - **Per-session locking** so a fresh session's first burst yields exactly one winner
//! - **Fail-open** on missing sessions, disabled policies and store faults
//! - **429 translation** with a JSON `{"name", "data"}` body
//!
//! ## Quick Start
//!
//! ```rust
//! use sessiongate::{DebounceGate, InMemorySessionStore, PolicyTable, Verdict};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemorySessionStore::new();
//!     let session = store.create().unwrap();
//!     let gate = DebounceGate::new(store, PolicyTable::new().with_route("/debounce", 3_000));
//!
//!     assert_eq!(gate.check("/debounce", Some(&session)).await, Verdict::Allowed);
//!     assert!(gate.check("/debounce", Some(&session)).await.is_rejected());
//! }
//! ```

pub mod clock;
pub mod dynamic;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod policy;
pub mod response;
pub mod session;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use dynamic::DynamicConfig;
pub use error::{Debounced, GateError, StateError};
pub use gate::{decide, BypassReason, Decision, DebounceGate, GateBuilder, RejectionMode, Verdict};
pub use middleware::{DebounceLayer, DebounceService, GateRequest};
pub use policy::{DebouncePolicy, PolicyError, PolicyResolver, PolicyTable};
pub use response::{rejection_response, ErrorBody, RejectionLayer, RejectionService};
pub use session::{InMemorySessionStore, RecordMap, SessionId, SessionStore, StoreError};
