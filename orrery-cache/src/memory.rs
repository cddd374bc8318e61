//! In-memory record cache.

use crate::inverse_index::InverseRelationshipIndex;
use crate::traits::SyncRecordCache;
use orrery_core::{
    CacheSettings, CacheSnapshot, OrreryResult, Record, RecordIdentity, RecordRelationship, RecordSelection,
    Schema,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Record store plus inverse index, both owned exclusively by the cache.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    schema: Arc<Schema>,
    settings: CacheSettings,
    records: BTreeMap<RecordIdentity, Record>,
    inverse: InverseRelationshipIndex,
}

impl MemoryCache {
    /// Symmetry decisions come from the schema, so callers handing in an
    /// unchecked schema should go through [`MemoryCache::try_with_settings`].
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_settings(schema, CacheSettings::default())
    }

    pub fn with_settings(schema: Arc<Schema>, settings: CacheSettings) -> Self {
        Self {
            schema,
            settings,
            records: BTreeMap::new(),
            inverse: InverseRelationshipIndex::new(),
        }
    }

    /// Build a cache after checking the schema's relationship declarations.
    pub fn try_with_settings(schema: Arc<Schema>, settings: CacheSettings) -> OrreryResult<Self> {
        schema.validate()?;
        Ok(Self::with_settings(schema, settings))
    }

    /// Build a cache seeded with a snapshot.
    pub fn from_snapshot(schema: Arc<Schema>, settings: CacheSettings, snapshot: CacheSnapshot) -> Self {
        let mut cache = Self::with_settings(schema, settings);
        cache.reset(Some(snapshot));
        cache
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            records: self.records.values().cloned().collect(),
            inverse_relationships: self.inverse.iter().cloned().collect(),
        }
    }

    /// Replace the full state; `None` empties the cache. The inverse index is
    /// taken from the snapshot as-is, not recomputed.
    pub fn reset(&mut self, snapshot: Option<CacheSnapshot>) {
        let snapshot = snapshot.unwrap_or_default();
        self.records = snapshot
            .records
            .into_iter()
            .map(|record| (record.identity.clone(), record))
            .collect();
        self.inverse = snapshot.inverse_relationships.into_iter().collect();
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.inverse.is_empty()
    }

    pub fn inverse_index(&self) -> &InverseRelationshipIndex {
        &self.inverse
    }

    pub fn set_settings(&mut self, settings: CacheSettings) {
        self.settings = settings;
    }
}

impl SyncRecordCache for MemoryCache {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn get_record(&self, identity: &RecordIdentity) -> Option<&Record> {
        self.records.get(identity)
    }

    fn get_records(&self, selection: &RecordSelection) -> Vec<Record> {
        match selection {
            RecordSelection::OfType(record_type) => self
                .records
                .range(RecordIdentity::new(record_type.as_str(), "")..)
                .take_while(|(identity, _)| identity.record_type == *record_type)
                .map(|(_, record)| record.clone())
                .collect(),
            RecordSelection::Identities(identities) => identities
                .iter()
                .filter_map(|identity| self.records.get(identity).cloned())
                .collect(),
        }
    }

    fn set_record(&mut self, record: Record) {
        self.records.insert(record.identity.clone(), record);
    }

    fn remove_record(&mut self, identity: &RecordIdentity) -> Option<Record> {
        self.records.remove(identity)
    }

    fn get_inverse_relationships(&self, identity: &RecordIdentity) -> Vec<RecordRelationship> {
        self.inverse.pointing_at(identity)
    }

    fn add_inverse_relationships(&mut self, edges: &[RecordRelationship]) {
        for edge in edges {
            self.inverse.add(edge.clone());
        }
    }

    fn remove_inverse_relationships(&mut self, edges: &[RecordRelationship]) {
        for edge in edges {
            self.inverse.remove(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_core::{
        ModelDefinition, OrreryError, RecordChangeset, RelationshipDefinition, ValidationError,
    };

    fn cache() -> MemoryCache {
        let schema = Schema::new()
            .model("planet", ModelDefinition::new())
            .model("star", ModelDefinition::new());
        MemoryCache::new(Arc::new(schema))
    }

    #[test]
    fn test_try_with_settings_rejects_undefined_target() {
        let schema = Schema::new().model(
            "star",
            ModelDefinition::new().relationship("planets", RelationshipDefinition::has_many("planet")),
        );
        let err = MemoryCache::try_with_settings(Arc::new(schema), CacheSettings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::InvalidSchema { .. })
        ));

        assert!(MemoryCache::try_with_settings(Arc::clone(cache().schema()), CacheSettings::default()).is_ok());
    }

    #[test]
    fn test_get_records_by_type_and_identities() {
        let mut cache = cache();
        cache.set_records(vec![
            Record::new("planet", "earth"),
            Record::new("planet", "mars"),
            Record::new("star", "sol"),
        ]);

        let planets = cache.get_records(&RecordSelection::OfType("planet".to_string()));
        assert_eq!(planets.len(), 2);

        let picked = cache.get_records(&RecordSelection::Identities(vec![
            RecordIdentity::new("star", "sol"),
            RecordIdentity::new("star", "vega"),
            RecordIdentity::new("planet", "earth"),
        ]));
        let ids: Vec<_> = picked.iter().map(Record::id).collect();
        assert_eq!(ids, vec!["sol", "earth"]);
    }

    #[test]
    fn test_set_record_overwrites_wholesale() {
        let mut cache = cache();
        cache.set_record(Record::new("planet", "earth").with_attribute("name", "Earth"));
        cache.set_record(Record::new("planet", "earth"));
        let earth = cache.get_record(&RecordIdentity::new("planet", "earth")).unwrap();
        assert!(earth.attributes.is_empty());
    }

    #[test]
    fn test_inverse_relationships_follow_input_order() {
        let mut cache = cache();
        let sol = RecordIdentity::new("star", "sol");
        let earth = RecordIdentity::new("planet", "earth");
        let mars = RecordIdentity::new("planet", "mars");
        let to_mars = RecordRelationship::new(sol.clone(), "planets", mars.clone());
        let to_earth = RecordRelationship::new(sol.clone(), "planets", earth.clone());
        cache.add_inverse_relationships(&[to_earth.clone(), to_mars.clone()]);

        assert_eq!(
            cache.get_inverse_relationships_of(&[mars, earth]),
            vec![to_mars, to_earth]
        );
    }

    #[test]
    fn test_apply_changeset_and_snapshot_reset() {
        let mut cache = cache();
        let sol = RecordIdentity::new("star", "sol");
        let earth = RecordIdentity::new("planet", "earth");
        let edge = RecordRelationship::new(sol.clone(), "planets", earth.clone());
        cache.set_record(Record::new("planet", "pluto"));

        cache.apply_record_changeset(&RecordChangeset {
            set_records: Some(vec![Record::from_identity(sol.clone())]),
            remove_records: Some(vec![RecordIdentity::new("planet", "pluto")]),
            add_inverse_relationships: Some(vec![edge.clone()]),
            remove_inverse_relationships: None,
        });
        assert_eq!(cache.record_count(), 1);
        assert_eq!(cache.get_inverse_relationships(&earth), vec![edge]);

        let snapshot = cache.snapshot();
        let restored = MemoryCache::from_snapshot(
            Arc::clone(cache.schema()),
            CacheSettings::default(),
            snapshot.clone(),
        );
        assert_eq!(restored.snapshot(), snapshot);

        cache.reset(None);
        assert!(cache.is_empty());
    }
}
