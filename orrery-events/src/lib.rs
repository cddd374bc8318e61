//! Orrery Events - Ordered Async Listener Registry
//!
//! Sources announce every phase of a request through named events
//! (`beforeUpdate`, `update`, `updateFail`, `transform`, ...). This crate
//! provides the registry those events are emitted through.
//!
//! # Delivery
//!
//! Listeners run strictly one after another in registration order, each
//! awaited before the next starts, so a later listener observes the side
//! effects of earlier ones. Two drivers are offered:
//!
//! - [`EventRegistry::fulfill_in_series`]: stops at the first failing
//!   listener and returns its error (used for `before*` hooks).
//! - [`EventRegistry::settle_in_series`]: runs every listener regardless of
//!   failures, logging them (used for success, fail and `transform` events).
//!
//! ```text
//! emit(beforeUpdate) ─► L1 ─await─► L2 ─await─► L3 ─► handler
//!                        │ Err
//!                        └────────► updateFail ─► caller
//! ```

mod registry;

pub use registry::{EventRegistry, Listener, ListenerFuture, ListenerId};
