//! Orrery Source - Request Lifecycle and Capabilities
//!
//! A source exposes capabilities (update, query, pull, push, sync). Every
//! request, whatever the capability, goes through the same lifecycle:
//!
//! 1. validate the envelope ([`RequestEnvelope`])
//! 2. for mutating requests, resolve as a no-op when the transform id is
//!    already in the [`TransformLog`]
//! 3. emit `before<Kind>` to observers in series; any failure rejects
//! 4. run the source's handler with the shared [`Hints`]
//! 5. append returned transforms to the log, emitting `transform` for each
//! 6. emit `<kind>` on success or `<kind>Fail` on any failure
//! 7. shape the response: bare data, or a [`FullResponse`] on request
//!
//! [`MemorySource`] implements every capability over a
//! [`MemoryCache`](orrery_cache::MemoryCache).

pub mod capabilities;
pub mod lifecycle;
pub mod log;
pub mod memory;
pub mod request;

pub use capabilities::{Pullable, Pushable, Queryable, Source, Syncable, Updatable};
pub use lifecycle::run_request;
pub use log::{LogEntry, TransformLog};
pub use memory::MemorySource;
pub use request::{
    EventPayload, FullResponse, HandlerFuture, HandlerResponse, Hints, NamedResponse,
    RequestEnvelope, RequestKind, RequestOutcome, ResponseData, SharedHints, SourceEvent,
    SourceEvents,
};
