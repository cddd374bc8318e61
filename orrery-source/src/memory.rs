//! Cache-backed source implementing every capability.

use crate::capabilities::{Pullable, Pushable, Queryable, Source, Syncable, Updatable};
use crate::log::TransformLog;
use crate::request::{HandlerResponse, ResponseData, SharedHints, SourceEvents};
use async_trait::async_trait;
use orrery_cache::{MemoryCache, SharedRecordCache, SyncRecordCache, TransformBuffer};
use orrery_core::{
    CacheSnapshot, OrreryError, OrreryResult, Query, QueryResult, Schema, SourceSettings,
    Transform, TransformBuilder, UpdateStrategy,
};
use serde_json::json;
use std::sync::Arc;

/// A source whose backend is a [`MemoryCache`].
///
/// `update`, `push` and `sync` apply the transform to the cache using the
/// configured [`UpdateStrategy`]; `query` evaluates against the cache;
/// `pull` returns a transform of `addRecord` operations for the records a
/// query matches.
#[derive(Debug)]
pub struct MemorySource {
    settings: SourceSettings,
    cache: SharedRecordCache<MemoryCache>,
    log: TransformLog,
    events: SourceEvents,
}

impl MemorySource {
    /// Fails when the settings or the schema's relationship declarations
    /// are invalid.
    pub fn new(schema: Arc<Schema>, settings: SourceSettings) -> OrreryResult<Self> {
        settings.validate()?;
        let cache = MemoryCache::try_with_settings(schema, settings.cache.clone())?;
        Ok(Self {
            settings,
            cache: SharedRecordCache::new(cache),
            log: TransformLog::new(),
            events: SourceEvents::new(),
        })
    }

    /// Build from `ORRERY_*` environment variables.
    pub fn from_env(schema: Arc<Schema>) -> OrreryResult<Self> {
        Self::new(schema, SourceSettings::from_env()?)
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// The backing cache.
    pub fn cache(&self) -> &SharedRecordCache<MemoryCache> {
        &self.cache
    }

    /// Replace the cache state and clear the transform log.
    pub async fn reset(&self, state: Option<CacheSnapshot>) {
        self.cache.write().await.reset(state);
        self.log.clear().await;
    }

    async fn apply(&self, transform: &Transform) -> OrreryResult<HandlerResponse> {
        let mut cache = self.cache.write().await;
        let inverse = match self.settings.update_strategy {
            UpdateStrategy::Direct => cache.patch_atomic(&transform.operations)?,
            UpdateStrategy::Buffered => {
                // Full copy of the cache per update.
                let mut buffer =
                    TransformBuffer::new(Arc::clone(cache.schema()), cache.settings().clone());
                buffer.reset(Some(cache.snapshot()));
                buffer.start_tracking_changes()?;
                let inverse = buffer.patch(&transform.operations)?;
                let changeset = buffer.stop_tracking_changes()?;
                cache.apply_record_changeset(&changeset);
                inverse
            }
        };
        drop(cache);

        tracing::debug!(
            source = %self.settings.name,
            transform = %transform.id,
            operations = transform.operations.len(),
            strategy = ?self.settings.update_strategy,
            "Applied transform"
        );

        let inverse = serde_json::to_value(&inverse)
            .map_err(|e| OrreryError::handler(&self.settings.name, e.to_string()))?;
        Ok(HandlerResponse::default()
            .with_details(json!({ "inverseOperations": inverse }))
            .with_transforms(vec![transform.clone()]))
    }

    async fn evaluate(&self, query: &Query) -> OrreryResult<Vec<QueryResult>> {
        self.cache.read().await.query(query)
    }
}

impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn transform_log(&self) -> &TransformLog {
        &self.log
    }

    fn events(&self) -> &SourceEvents {
        &self.events
    }
}

#[async_trait]
impl Updatable for MemorySource {
    async fn handle_update(
        &self,
        transform: Arc<Transform>,
        _hints: SharedHints,
    ) -> OrreryResult<HandlerResponse> {
        self.apply(&transform).await
    }
}

#[async_trait]
impl Pushable for MemorySource {
    async fn handle_push(
        &self,
        transform: Arc<Transform>,
        _hints: SharedHints,
    ) -> OrreryResult<HandlerResponse> {
        self.apply(&transform).await
    }
}

#[async_trait]
impl Syncable for MemorySource {
    async fn handle_sync(
        &self,
        transform: Arc<Transform>,
        _hints: SharedHints,
    ) -> OrreryResult<HandlerResponse> {
        self.apply(&transform).await
    }
}

#[async_trait]
impl Queryable for MemorySource {
    async fn handle_query(
        &self,
        query: Arc<Query>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse> {
        let hinted = hints.lock().await.data.take();
        if let Some(data) = hinted {
            tracing::debug!(source = %self.settings.name, query = %query.id, "Answering from hints");
            return Ok(HandlerResponse::data(data));
        }
        let results = self.evaluate(&query).await?;
        Ok(HandlerResponse::data(ResponseData::Results(results)))
    }
}

#[async_trait]
impl Pullable for MemorySource {
    async fn handle_pull(
        &self,
        query: Arc<Query>,
        hints: SharedHints,
    ) -> OrreryResult<HandlerResponse> {
        let hinted = hints.lock().await.data.take();
        let transforms = match hinted {
            Some(ResponseData::Transforms(transforms)) => transforms,
            _ => {
                let t = TransformBuilder;
                let operations = self
                    .evaluate(&query)
                    .await?
                    .into_iter()
                    .flat_map(QueryResult::into_records)
                    .map(|record| t.add_record(record))
                    .collect();
                vec![Transform::new(operations)]
            }
        };
        Ok(HandlerResponse::data(ResponseData::Transforms(transforms.clone()))
            .with_transforms(transforms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestOutcome;
    use orrery_core::{QueryBuilder, Record, RecordIdentity};
    use orrery_core::{ModelDefinition, RelationshipDefinition};

    fn source(strategy: UpdateStrategy) -> MemorySource {
        let schema = Schema::new()
            .model(
                "star",
                ModelDefinition::new().relationship(
                    "planets",
                    RelationshipDefinition::has_many("planet").with_inverse("star"),
                ),
            )
            .model(
                "planet",
                ModelDefinition::new()
                    .attribute("name", orrery_core::AttributeKind::String)
                    .relationship(
                        "star",
                        RelationshipDefinition::has_one("star").with_inverse("planets"),
                    ),
            );
        MemorySource::new(
            Arc::new(schema),
            SourceSettings::new("memory").with_update_strategy(strategy),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_then_query() {
        let source = source(UpdateStrategy::Direct);
        let t = TransformBuilder;
        let transform = Transform::new(vec![
            t.add_record(Record::new("planet", "earth").with_attribute("name", "Earth")),
            t.add_to_related_records(
                RecordIdentity::new("star", "sol"),
                "planets",
                RecordIdentity::new("planet", "earth"),
            ),
        ]);

        let outcome = source.update(transform.clone()).await.unwrap();
        assert_eq!(outcome, RequestOutcome::Data(ResponseData::Transforms(vec![transform])));

        let outcome = source
            .query(Query::from(QueryBuilder.find_related_records(
                RecordIdentity::new("star", "sol"),
                "planets",
            )))
            .await
            .unwrap();
        assert_eq!(outcome.results()[0].as_records().len(), 1);
    }

    #[tokio::test]
    async fn test_buffered_failure_leaves_cache_untouched() {
        let source = source(UpdateStrategy::Buffered);
        let t = TransformBuilder;
        let transform = Transform::new(vec![
            t.add_record(Record::new("planet", "earth")),
            t.replace_attribute(RecordIdentity::new("planet", "earth"), "name", 3),
        ]);

        assert!(source.update(transform).await.is_err());
        assert_eq!(source.cache().read().await.record_count(), 0);
    }

    #[tokio::test]
    async fn test_pull_returns_add_record_transform() {
        let source = source(UpdateStrategy::Direct);
        let t = TransformBuilder;
        source
            .update(Transform::new(vec![t.add_record(Record::new("planet", "mars"))]))
            .await
            .unwrap();

        let outcome = source
            .pull(Query::from(QueryBuilder.find_records("planet")))
            .await
            .unwrap();
        let transforms = outcome.transforms();
        assert_eq!(transforms.len(), 1);
        assert_eq!(
            transforms[0].operations,
            vec![t.add_record(Record::new("planet", "mars"))]
        );
        assert!(source.transform_log().contains(&transforms[0].id).await);
    }

    #[test]
    fn test_from_env_validates_settings() {
        let source = MemorySource::from_env(Arc::new(Schema::new())).unwrap();
        assert!(source.settings().validate().is_ok());
        assert_eq!(source.name(), source.settings().name);
    }

    #[test]
    fn test_new_rejects_inconsistent_schema() {
        let schema = Schema::new().model(
            "star",
            ModelDefinition::new().relationship(
                "planets",
                RelationshipDefinition::has_many("planet").with_inverse("star"),
            ),
        );
        let result = MemorySource::new(Arc::new(schema), SourceSettings::new("memory"));
        assert!(matches!(
            result,
            Err(OrreryError::Validation(orrery_core::ValidationError::InvalidSchema { .. }))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_cache_and_log() {
        let source = source(UpdateStrategy::Direct);
        let t = TransformBuilder;
        source
            .sync(Transform::new(vec![t.add_record(Record::new("planet", "mars"))]))
            .await
            .unwrap();
        assert_eq!(source.transform_log().len().await, 1);

        source.reset(None).await;
        assert!(source.transform_log().is_empty().await);
        assert_eq!(source.cache().read().await.record_count(), 0);
    }
}
