//! The request lifecycle shared by every capability.
//!
//! ```text
//! validate ─► dedupe ─► before* (in series) ─► handler ─► log + transform
//!    │          │            │                    │          events
//!    │       no-op           └──── Err ───────────┴──► *Fail ─► caller
//!    └──── Err ─────────────────────────────────────► *Fail ─► caller
//!                                                success event ─► shape
//! ```
//!
//! Phases of one request never overlap. Requests to the same source may
//! interleave at await points; only the transform-log dedupe is enforced
//! across them.

use crate::capabilities::Source;
use crate::request::{
    EventPayload, FullResponse, HandlerFuture, HandlerResponse, RequestEnvelope, RequestKind,
    RequestOutcome, ResponseData, SharedHints, SourceEvent,
};
use orrery_core::{OrreryError, OrreryResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

/// Drive one request through the lifecycle.
///
/// `handler` receives the hints populated by `before*` observers and
/// performs the source-specific work. Every failure fires the matching
/// `*Fail` event and is returned unchanged; failed mutating requests are
/// marked rejected in the transform log.
pub async fn run_request<'a, S, F>(
    source: &'a S,
    kind: RequestKind,
    request: RequestEnvelope,
    handler: F,
) -> OrreryResult<RequestOutcome>
where
    S: Source + ?Sized,
    F: FnOnce(SharedHints) -> HandlerFuture<'a> + Send + 'a,
{
    let span = tracing::debug_span!(
        "request",
        source = source.name(),
        kind = %kind,
        id = %request.id()
    );

    async move {
        match execute(source, kind, &request, handler).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::debug!(error = %error, "Request failed");
                source
                    .events()
                    .settle_in_series(
                        &SourceEvent::Fail(kind),
                        EventPayload::Fail {
                            request: request.clone(),
                            error: error.clone(),
                        },
                    )
                    .await;
                if kind.is_mutating() && !request.id().is_empty() {
                    source.transform_log().mark_rejected(request.id()).await;
                }
                Err(error)
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute<'a, S, F>(
    source: &'a S,
    kind: RequestKind,
    request: &RequestEnvelope,
    handler: F,
) -> OrreryResult<RequestOutcome>
where
    S: Source + ?Sized,
    F: FnOnce(SharedHints) -> HandlerFuture<'a> + Send + 'a,
{
    request.validate()?;

    if kind.is_mutating() && source.transform_log().check(request.id()).await? {
        tracing::debug!("Transform already applied");
        return Ok(shape(kind, request, HandlerResponse::default(), BTreeMap::new()));
    }

    let hints = SharedHints::default();
    let before = SourceEvent::Before(kind);
    let contributions = source
        .events()
        .fulfill_in_series(
            &before,
            EventPayload::Before {
                request: request.clone(),
                hints: Arc::clone(&hints),
            },
        )
        .await
        .map_err(|error| match error {
            OrreryError::ObserverRejection { .. } => error,
            other => OrreryError::observer_rejection(before.to_string(), other.to_string()),
        })?;
    let sources: BTreeMap<String, FullResponse> = contributions.into_iter().flatten().collect();

    let response = handler(hints).await?;

    for transform in &response.transforms {
        if !source.transform_log().append(&transform.id).await {
            tracing::trace!(transform = %transform.id, "Transform was already logged");
        }
        source
            .events()
            .settle_in_series(
                &SourceEvent::Transform,
                EventPayload::Transform {
                    transform: Arc::new(transform.clone()),
                },
            )
            .await;
    }

    source
        .events()
        .settle_in_series(
            &SourceEvent::Success(kind),
            EventPayload::Success {
                request: request.clone(),
                response: Arc::new(response.clone()),
            },
        )
        .await;

    tracing::debug!(transforms = response.transforms.len(), "Request completed");
    Ok(shape(kind, request, response, sources))
}

fn shape(
    kind: RequestKind,
    request: &RequestEnvelope,
    response: HandlerResponse,
    sources: BTreeMap<String, FullResponse>,
) -> RequestOutcome {
    if request.options().full_response {
        let mut full = FullResponse::from(response);
        full.sources = sources;
        RequestOutcome::Full(full)
    } else if kind.returns_transforms() {
        RequestOutcome::Data(ResponseData::Transforms(response.transforms))
    } else {
        RequestOutcome::Data(response.data)
    }
}
