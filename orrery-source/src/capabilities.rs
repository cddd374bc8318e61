//! Source capabilities.
//!
//! A source implements [`Source`] plus one trait per capability it offers.
//! Each capability trait has one required handler and a provided request
//! method that runs the handler through [`run_request`].

use crate::lifecycle::run_request;
use crate::log::TransformLog;
use crate::request::{
    HandlerResponse, RequestEnvelope, RequestKind, RequestOutcome, SharedHints, SourceEvents,
};
use async_trait::async_trait;
use orrery_core::{OrreryResult, Query, Transform};
use std::sync::Arc;

/// State every source carries.
pub trait Source: Send + Sync {
    /// Name used in logs and in full-response `sources` maps.
    fn name(&self) -> &str;

    fn transform_log(&self) -> &TransformLog;

    fn events(&self) -> &SourceEvents;
}

// ============================================================================
// MUTATING CAPABILITIES
// ============================================================================

/// Accepts transforms to apply.
#[async_trait]
pub trait Updatable: Source {
    /// Apply `transform`; the response lists the transforms applied.
    async fn handle_update(
        &self,
        transform: Arc<Transform>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse>;

    async fn update(&self, transform: Transform) -> OrreryResult<RequestOutcome> {
        let transform = Arc::new(transform);
        let request = RequestEnvelope::Transform(Arc::clone(&transform));
        run_request(self, RequestKind::Update, request, move |hints| {
            self.handle_update(transform, hints)
        })
        .await
    }
}

/// Pushes transforms to the backend behind the source.
#[async_trait]
pub trait Pushable: Source {
    async fn handle_push(
        &self,
        transform: Arc<Transform>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse>;

    async fn push(&self, transform: Transform) -> OrreryResult<RequestOutcome> {
        let transform = Arc::new(transform);
        let request = RequestEnvelope::Transform(Arc::clone(&transform));
        run_request(self, RequestKind::Push, request, move |hints| {
            self.handle_push(transform, hints)
        })
        .await
    }
}

/// Absorbs transforms applied elsewhere.
#[async_trait]
pub trait Syncable: Source {
    async fn handle_sync(
        &self,
        transform: Arc<Transform>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse>;

    async fn sync(&self, transform: Transform) -> OrreryResult<RequestOutcome> {
        let transform = Arc::new(transform);
        let request = RequestEnvelope::Transform(Arc::clone(&transform));
        run_request(self, RequestKind::Sync, request, move |hints| {
            self.handle_sync(transform, hints)
        })
        .await
    }
}

// ============================================================================
// READING CAPABILITIES
// ============================================================================

/// Answers queries.
#[async_trait]
pub trait Queryable: Source {
    /// Evaluate `query`, or return `hints.data` when an observer supplied it.
    async fn handle_query(
        &self,
        query: Arc<Query>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse>;

    async fn query(&self, query: Query) -> OrreryResult<RequestOutcome> {
        let query = Arc::new(query);
        let request = RequestEnvelope::Query(Arc::clone(&query));
        run_request(self, RequestKind::Query, request, move |hints| {
            self.handle_query(query, hints)
        })
        .await
    }
}

/// Produces the transforms that would reproduce a query's records.
#[async_trait]
pub trait Pullable: Source {
    async fn handle_pull(
        &self,
        query: Arc<Query>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse>;

    async fn pull(&self, query: Query) -> OrreryResult<RequestOutcome> {
        let query = Arc::new(query);
        let request = RequestEnvelope::Query(Arc::clone(&query));
        run_request(self, RequestKind::Pull, request, move |hints| {
            self.handle_pull(query, hints)
        })
        .await
    }
}
