//! Request envelopes, hints, events and response shapes.

use futures_util::future::BoxFuture;
use orrery_core::{OrreryError, OrreryResult, Query, QueryResult, RequestOptions, Transform};
use orrery_events::EventRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// REQUEST KINDS AND EVENTS
// ============================================================================

/// The five source capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Update,
    Query,
    Pull,
    Push,
    Sync,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Update => "update",
            RequestKind::Query => "query",
            RequestKind::Pull => "pull",
            RequestKind::Push => "push",
            RequestKind::Sync => "sync",
        }
    }

    /// Requests carrying a transform that is applied at most once per id.
    pub fn is_mutating(&self) -> bool {
        matches!(self, RequestKind::Update | RequestKind::Push | RequestKind::Sync)
    }

    /// Whether the bare response is the transform list rather than data.
    pub fn returns_transforms(&self) -> bool {
        !matches!(self, RequestKind::Query)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named source events.
///
/// Display gives the event name: `beforeUpdate`, `update`, `updateFail`,
/// `transform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceEvent {
    Before(RequestKind),
    Success(RequestKind),
    Fail(RequestKind),
    Transform,
}

impl fmt::Display for SourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn capitalized(kind: &RequestKind) -> String {
            let name = kind.as_str();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        }
        match self {
            SourceEvent::Before(kind) => write!(f, "before{}", capitalized(kind)),
            SourceEvent::Success(kind) => write!(f, "{}", kind),
            SourceEvent::Fail(kind) => write!(f, "{}Fail", kind),
            SourceEvent::Transform => f.write_str("transform"),
        }
    }
}

// ============================================================================
// ENVELOPES AND HINTS
// ============================================================================

/// A canonical request: a transform or a query.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEnvelope {
    Transform(Arc<Transform>),
    Query(Arc<Query>),
}

impl RequestEnvelope {
    pub fn id(&self) -> &str {
        match self {
            RequestEnvelope::Transform(transform) => &transform.id,
            RequestEnvelope::Query(query) => &query.id,
        }
    }

    pub fn options(&self) -> &RequestOptions {
        match self {
            RequestEnvelope::Transform(transform) => &transform.options,
            RequestEnvelope::Query(query) => &query.options,
        }
    }

    pub fn validate(&self) -> OrreryResult<()> {
        match self {
            RequestEnvelope::Transform(transform) => transform.validate(),
            RequestEnvelope::Query(query) => query.validate(),
        }
    }

    pub fn as_transform(&self) -> Option<&Arc<Transform>> {
        match self {
            RequestEnvelope::Transform(transform) => Some(transform),
            RequestEnvelope::Query(_) => None,
        }
    }

    pub fn as_query(&self) -> Option<&Arc<Query>> {
        match self {
            RequestEnvelope::Query(query) => Some(query),
            RequestEnvelope::Transform(_) => None,
        }
    }
}

impl From<Transform> for RequestEnvelope {
    fn from(transform: Transform) -> Self {
        RequestEnvelope::Transform(Arc::new(transform))
    }
}

impl From<Query> for RequestEnvelope {
    fn from(query: Query) -> Self {
        RequestEnvelope::Query(Arc::new(query))
    }
}

/// Out-parameter `before*` observers fill to steer the handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints {
    /// Result the handler may return instead of doing its own lookup.
    pub data: Option<ResponseData>,
    pub details: Option<Value>,
}

/// Hints shared between observers and the handler of one request.
pub type SharedHints = Arc<Mutex<Hints>>;

// ============================================================================
// RESPONSES
// ============================================================================

/// Primary data of a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseData {
    #[default]
    None,
    /// One result per query expression.
    Results(Vec<QueryResult>),
    Transforms(Vec<Transform>),
}

impl ResponseData {
    pub fn is_none(&self) -> bool {
        matches!(self, ResponseData::None)
    }

    pub fn results(&self) -> &[QueryResult] {
        match self {
            ResponseData::Results(results) => results,
            _ => &[],
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        match self {
            ResponseData::Transforms(transforms) => transforms,
            _ => &[],
        }
    }
}

/// What a concrete handler returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerResponse {
    pub data: ResponseData,
    pub details: Option<Value>,
    /// Transforms the handler applied, appended to the log in order.
    pub transforms: Vec<Transform>,
}

impl HandlerResponse {
    pub fn data(data: ResponseData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_transforms(mut self, transforms: Vec<Transform>) -> Self {
        self.transforms = transforms;
        self
    }
}

/// The full response bag, including the named responses of sources that
/// contributed through `before*` hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullResponse {
    pub data: ResponseData,
    pub details: Option<Value>,
    pub transforms: Vec<Transform>,
    pub sources: BTreeMap<String, FullResponse>,
}

impl From<HandlerResponse> for FullResponse {
    fn from(response: HandlerResponse) -> Self {
        Self {
            data: response.data,
            details: response.details,
            transforms: response.transforms,
            sources: BTreeMap::new(),
        }
    }
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Bare primary data, or the transform list for transform-returning kinds.
    Data(ResponseData),
    Full(FullResponse),
}

impl RequestOutcome {
    pub fn data(&self) -> &ResponseData {
        match self {
            RequestOutcome::Data(data) => data,
            RequestOutcome::Full(full) => &full.data,
        }
    }

    pub fn into_full(self) -> Option<FullResponse> {
        match self {
            RequestOutcome::Full(full) => Some(full),
            RequestOutcome::Data(_) => None,
        }
    }

    /// Query results of a bare response.
    pub fn results(&self) -> &[QueryResult] {
        self.data().results()
    }

    /// Transforms of a bare or full response.
    pub fn transforms(&self) -> &[Transform] {
        match self {
            RequestOutcome::Data(data) => data.transforms(),
            RequestOutcome::Full(full) => &full.transforms,
        }
    }
}

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

/// Payload handed to source event listeners.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Before {
        request: RequestEnvelope,
        hints: SharedHints,
    },
    Success {
        request: RequestEnvelope,
        response: Arc<HandlerResponse>,
    },
    Fail {
        request: RequestEnvelope,
        error: OrreryError,
    },
    Transform {
        transform: Arc<Transform>,
    },
}

impl EventPayload {
    pub fn request(&self) -> Option<&RequestEnvelope> {
        match self {
            EventPayload::Before { request, .. }
            | EventPayload::Success { request, .. }
            | EventPayload::Fail { request, .. } => Some(request),
            EventPayload::Transform { .. } => None,
        }
    }
}

/// A named full response a `before*` listener contributes.
pub type NamedResponse = (String, FullResponse);

/// Event registry of a source. Listeners resolve to an optional named
/// response; only `before*` contributions are collected.
pub type SourceEvents = EventRegistry<SourceEvent, EventPayload, Option<NamedResponse>>;

/// Future returned by a concrete handler.
pub type HandlerFuture<'a> = BoxFuture<'a, OrreryResult<HandlerResponse>>;
