//! Operation processor: validates one operation, applies it through the
//! cache primitives and collects the operations that undo it.
//!
//! Every relationship change funnels through two routines, [`link`] and
//! [`unlink`]. They keep the record's relationship field, the inverse index
//! and (when the schema materializes an inverse on the related type) the
//! related record's mirror field in step:
//!
//! ```text
//! link(sol, planets, earth)
//!   sol.planets += earth        inverse: removeFromRelatedRecords
//!   index += (sol, planets, earth)
//!   link(earth, star, sol)      one level only
//!     earth.star: alpha → sol   unlink(earth, star, alpha) first
//! ```
//!
//! Undo operations are recorded in application order; replaying them in
//! reverse restores the previous state, with the later replays turning into
//! no-ops once the symmetric side has already been restored.
//!
//! Creating a record is undone by `removeRecord`, which prunes whatever
//! points at the identity. Referrers that pointed at it before the creation
//! get a relink recorded ahead of the removal, so the replay puts their
//! edges back:
//!
//! ```text
//! mars.neighbor -> earth          (earth absent)
//! link(sol, planets, earth)       creates stub earth
//!   inverse: replaceRelatedRecord(mars, neighbor, earth), removeRecord(earth), ...
//! ```
//!
//! [`link`]: OperationProcessor::link
//! [`unlink`]: OperationProcessor::unlink

use crate::traits::SyncRecordCache;
use orrery_core::{
    CacheSettings, InboundEdgePolicy, OrreryResult, Record, RecordIdentity, RecordOperation,
    RecordRelationship, RelationshipData, RelationshipKind, Schema,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Check an operation against the schema before anything is mutated.
pub fn validate_operation(
    schema: &Schema,
    settings: &CacheSettings,
    operation: &RecordOperation,
) -> OrreryResult<()> {
    let check_kinds = settings.validate_attributes;
    match operation {
        RecordOperation::AddRecord { record } | RecordOperation::UpdateRecord { record } => {
            schema.validate_record(record, check_kinds)
        }
        RecordOperation::RemoveRecord { record } => schema.validate_identity(record),
        RecordOperation::ReplaceAttribute {
            record,
            attribute,
            value,
        } => {
            schema.validate_identity(record)?;
            schema.validate_attribute(&record.record_type, attribute, value, check_kinds)
        }
        RecordOperation::ReplaceKey { record, key, .. } => {
            schema.validate_identity(record)?;
            schema.validate_key(&record.record_type, key)
        }
        RecordOperation::ReplaceRelatedRecord {
            record,
            relationship,
            related_record,
        } => {
            schema.validate_identity(record)?;
            schema.validate_relationship(
                &record.record_type,
                relationship,
                Some(RelationshipKind::HasOne),
                related_record.iter(),
            )
        }
        RecordOperation::ReplaceRelatedRecords {
            record,
            relationship,
            related_records,
        } => {
            schema.validate_identity(record)?;
            schema.validate_relationship(
                &record.record_type,
                relationship,
                Some(RelationshipKind::HasMany),
                related_records.iter(),
            )
        }
        RecordOperation::AddToRelatedRecords {
            record,
            relationship,
            related_record,
        }
        | RecordOperation::RemoveFromRelatedRecords {
            record,
            relationship,
            related_record,
        } => {
            schema.validate_identity(record)?;
            schema.validate_relationship(
                &record.record_type,
                relationship,
                Some(RelationshipKind::HasMany),
                std::iter::once(related_record),
            )
        }
    }
}

pub(crate) struct OperationProcessor<'a, C: ?Sized> {
    cache: &'a mut C,
    schema: Arc<Schema>,
    settings: CacheSettings,
    inverse: Vec<RecordOperation>,
}

impl<'a, C: SyncRecordCache + ?Sized> OperationProcessor<'a, C> {
    pub(crate) fn new(cache: &'a mut C) -> Self {
        let schema = Arc::clone(cache.schema());
        let settings = cache.settings().clone();
        Self {
            cache,
            schema,
            settings,
            inverse: Vec::new(),
        }
    }

    /// Apply one operation, returning its undo operations.
    pub(crate) fn apply(mut self, operation: &RecordOperation) -> OrreryResult<Vec<RecordOperation>> {
        validate_operation(&self.schema, &self.settings, operation)?;
        tracing::trace!(
            operation = operation.kind(),
            record = %operation.record(),
            "Applying operation"
        );

        match operation {
            RecordOperation::AddRecord { record } => self.add_record(record.clone().normalized())?,
            RecordOperation::UpdateRecord { record } => self.update_record(record)?,
            RecordOperation::RemoveRecord { record } => self.remove_record(record),
            RecordOperation::ReplaceAttribute {
                record,
                attribute,
                value,
            } => {
                self.ensure_record(record);
                self.replace_attribute(record, attribute, value);
            }
            RecordOperation::ReplaceKey { record, key, value } => {
                self.ensure_record(record);
                self.replace_key(record, key, value.as_deref());
            }
            RecordOperation::ReplaceRelatedRecord {
                record,
                relationship,
                related_record,
            } => {
                self.ensure_record(record);
                self.replace_has_one(record, relationship, related_record.as_ref())?;
            }
            RecordOperation::ReplaceRelatedRecords {
                record,
                relationship,
                related_records,
            } => {
                self.ensure_record(record);
                self.replace_has_many(record, relationship, related_records)?;
            }
            RecordOperation::AddToRelatedRecords {
                record,
                relationship,
                related_record,
            } => {
                self.ensure_record(record);
                self.link(record, relationship, related_record, true)?;
            }
            RecordOperation::RemoveFromRelatedRecords {
                record,
                relationship,
                related_record,
            } => self.unlink(record, relationship, related_record, true),
        }

        Ok(self.inverse)
    }

    // ========================================================================
    // RECORD-LEVEL OPERATIONS
    // ========================================================================

    fn add_record(&mut self, record: Record) -> OrreryResult<()> {
        let identity = record.identity.clone();

        let Some(existing) = self.cache.get_record(&identity).cloned() else {
            let mut created = record.clone();
            created.relationships.clear();
            self.create_record(created);
            for (name, data) in &record.relationships {
                for member in data.members() {
                    self.link(&identity, name, member, true)?;
                }
            }
            return Ok(());
        };

        // Wholesale replace: diff field by field so each change gets its own
        // undo and relationship changes stay symmetric.
        let attributes: BTreeSet<&String> = existing
            .attributes
            .keys()
            .chain(record.attributes.keys())
            .collect();
        for name in attributes {
            let value = record.attributes.get(name).cloned().unwrap_or(Value::Null);
            self.replace_attribute(&identity, name, &value);
        }

        let keys: BTreeSet<&String> = existing.keys.keys().chain(record.keys.keys()).collect();
        for name in keys {
            self.replace_key(&identity, name, record.key(name));
        }

        let relationships: BTreeSet<&String> = existing
            .relationships
            .keys()
            .chain(record.relationships.keys())
            .collect();
        for name in relationships {
            match (record.relationships.get(name), existing.relationships.get(name)) {
                (Some(RelationshipData::HasOne(related)), _) => {
                    self.replace_has_one(&identity, name, related.as_ref())?
                }
                (Some(RelationshipData::HasMany(related)), _) => {
                    self.replace_has_many(&identity, name, related)?
                }
                (None, Some(RelationshipData::HasOne(_))) => {
                    self.replace_has_one(&identity, name, None)?
                }
                (None, Some(RelationshipData::HasMany(_))) => {
                    self.replace_has_many(&identity, name, &[])?
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn update_record(&mut self, record: &Record) -> OrreryResult<()> {
        let identity = &record.identity;
        self.ensure_record(identity);

        for (name, value) in &record.attributes {
            self.replace_attribute(identity, name, value);
        }
        for (name, value) in &record.keys {
            self.replace_key(identity, name, Some(value));
        }
        for (name, data) in &record.relationships {
            match data {
                RelationshipData::HasOne(related) => {
                    self.replace_has_one(identity, name, related.as_ref())?
                }
                RelationshipData::HasMany(related) => {
                    self.replace_has_many(identity, name, related)?
                }
            }
        }
        Ok(())
    }

    /// Remove a record.
    ///
    /// Under `Prune` every referrer is unlinked, whether or not the record
    /// itself is stored, and the record's own relationships are cleared
    /// symmetrically first. Under `Retain` referrers keep their fields and
    /// their index entries; only the removed record's outbound edges leave
    /// the index.
    fn remove_record(&mut self, identity: &RecordIdentity) {
        if self.settings.inbound_edge_policy == InboundEdgePolicy::Prune {
            for edge in self.cache.get_inverse_relationships(identity) {
                self.unlink(&edge.record, &edge.relationship, identity, true);
            }
            let outbound = self
                .cache
                .get_record(identity)
                .map(Record::outbound_edges)
                .unwrap_or_default();
            for edge in outbound {
                self.unlink(identity, &edge.relationship, &edge.related_record, true);
            }

            // Entries no stored member backs.
            let unbacked = self.cache.get_inverse_relationships(identity);
            self.cache.remove_inverse_relationships(&unbacked);
        }

        let Some(removed) = self.cache.remove_record(identity) else {
            return;
        };
        if self.settings.inbound_edge_policy == InboundEdgePolicy::Retain {
            self.cache
                .remove_inverse_relationships(&removed.outbound_edges());
        }
        self.inverse.push(RecordOperation::AddRecord {
            record: removed.normalized(),
        });
    }

    /// Create an identity-only record when `identity` is missing.
    fn ensure_record(&mut self, identity: &RecordIdentity) {
        if self.cache.get_record(identity).is_none() {
            self.create_record(Record::from_identity(identity.clone()));
        }
    }

    /// Store a record whose identity is not in the cache yet.
    ///
    /// The undo is `removeRecord`, preceded by a relink for every referrer
    /// already pointing at the identity, since the removal unlinks them.
    fn create_record(&mut self, record: Record) {
        let identity = record.identity.clone();
        let relinks: Vec<RecordOperation> = self
            .cache
            .get_inverse_relationships(&identity)
            .iter()
            .filter_map(|edge| self.restore_operation(&edge.record, &edge.relationship, &identity))
            .collect();
        self.inverse.extend(relinks);
        self.cache.set_record(record);
        self.inverse.push(RecordOperation::RemoveRecord { record: identity });
    }

    /// Rewrite a stored record. Missing records are left alone.
    fn modify(&mut self, identity: &RecordIdentity, f: impl FnOnce(&mut Record)) {
        if let Some(mut record) = self.cache.get_record(identity).cloned() {
            f(&mut record);
            self.cache.set_record(record);
        }
    }

    // ========================================================================
    // FIELDS
    // ========================================================================

    fn replace_attribute(&mut self, identity: &RecordIdentity, attribute: &str, value: &Value) {
        let Some(current) = self.cache.get_record(identity) else {
            return;
        };
        let previous = current.attribute(attribute).cloned().unwrap_or(Value::Null);
        if previous == *value {
            return;
        }

        self.modify(identity, |record| {
            if value.is_null() {
                record.attributes.remove(attribute);
            } else {
                record
                    .attributes
                    .insert(attribute.to_string(), value.clone());
            }
        });
        self.inverse.push(RecordOperation::ReplaceAttribute {
            record: identity.clone(),
            attribute: attribute.to_string(),
            value: previous,
        });
    }

    fn replace_key(&mut self, identity: &RecordIdentity, key: &str, value: Option<&str>) {
        let Some(current) = self.cache.get_record(identity) else {
            return;
        };
        let previous = current.key(key).map(str::to_owned);
        if previous.as_deref() == value {
            return;
        }

        self.modify(identity, |record| match value {
            Some(value) => {
                record.keys.insert(key.to_string(), value.to_string());
            }
            None => {
                record.keys.remove(key);
            }
        });
        self.inverse.push(RecordOperation::ReplaceKey {
            record: identity.clone(),
            key: key.to_string(),
            value: previous,
        });
    }

    // ========================================================================
    // RELATIONSHIPS
    // ========================================================================

    fn replace_has_one(
        &mut self,
        identity: &RecordIdentity,
        relationship: &str,
        related: Option<&RecordIdentity>,
    ) -> OrreryResult<()> {
        if let Some(related) = related {
            return self.link(identity, relationship, related, true);
        }
        let current = self
            .cache
            .get_record(identity)
            .and_then(|record| record.has_one(relationship))
            .cloned();
        if let Some(current) = current {
            self.unlink(identity, relationship, &current, true);
        }
        Ok(())
    }

    fn replace_has_many(
        &mut self,
        identity: &RecordIdentity,
        relationship: &str,
        related: &[RecordIdentity],
    ) -> OrreryResult<()> {
        let current = self
            .cache
            .get_record(identity)
            .map(|record| record.has_many(relationship).to_vec())
            .unwrap_or_default();

        for member in current.iter().filter(|member| !related.contains(member)) {
            self.unlink(identity, relationship, member, true);
        }
        for member in related {
            self.link(identity, relationship, member, true)?;
        }
        Ok(())
    }

    /// Name of the mirror relationship on `related`, when the schema
    /// materializes one there.
    fn inverse_of(
        &self,
        identity: &RecordIdentity,
        relationship: &str,
        related: &RecordIdentity,
    ) -> Option<String> {
        self.schema
            .materialized_inverse(&identity.record_type, relationship, &related.record_type)
            .map(str::to_owned)
    }

    /// Point `identity.relationship` at `related`.
    ///
    /// A to-one relationship that already points elsewhere is unlinked from
    /// its previous target first (symmetrically). With `symmetric`, the
    /// mirror side is linked too, without recursing further.
    fn link(
        &mut self,
        identity: &RecordIdentity,
        relationship: &str,
        related: &RecordIdentity,
        symmetric: bool,
    ) -> OrreryResult<()> {
        let kind = self
            .schema
            .get_relationship(&identity.record_type, relationship)?
            .kind;
        self.ensure_record(identity);

        match kind {
            RelationshipKind::HasOne => {
                let current = self
                    .cache
                    .get_record(identity)
                    .and_then(|record| record.has_one(relationship))
                    .cloned();
                if current.as_ref() == Some(related) {
                    return Ok(());
                }
                if let Some(current) = current {
                    self.unlink(identity, relationship, &current, true);
                }
                self.modify(identity, |record| {
                    record.relationships.insert(
                        relationship.to_string(),
                        RelationshipData::HasOne(Some(related.clone())),
                    );
                });
                self.inverse.push(RecordOperation::ReplaceRelatedRecord {
                    record: identity.clone(),
                    relationship: relationship.to_string(),
                    related_record: None,
                });
            }
            RelationshipKind::HasMany => {
                let present = self
                    .cache
                    .get_record(identity)
                    .is_some_and(|record| record.has_many(relationship).contains(related));
                if present {
                    return Ok(());
                }
                self.modify(identity, |record| {
                    match record.relationships.get_mut(relationship) {
                        Some(RelationshipData::HasMany(members)) => members.push(related.clone()),
                        _ => {
                            record.relationships.insert(
                                relationship.to_string(),
                                RelationshipData::HasMany(vec![related.clone()]),
                            );
                        }
                    }
                });
                self.inverse.push(RecordOperation::RemoveFromRelatedRecords {
                    record: identity.clone(),
                    relationship: relationship.to_string(),
                    related_record: related.clone(),
                });
            }
        }

        self.cache.add_inverse_relationships(&[RecordRelationship::new(
            identity.clone(),
            relationship,
            related.clone(),
        )]);

        if symmetric {
            if let Some(inverse) = self.inverse_of(identity, relationship, related) {
                self.link(related, &inverse, identity, false)?;
            }
        }
        Ok(())
    }

    /// The operation that puts `related` back into `identity.relationship`,
    /// when the stored record currently holds it there.
    fn restore_operation(
        &self,
        identity: &RecordIdentity,
        relationship: &str,
        related: &RecordIdentity,
    ) -> Option<RecordOperation> {
        match self.cache.get_record(identity)?.relationship(relationship)? {
            RelationshipData::HasOne(Some(member)) if member == related => {
                Some(RecordOperation::ReplaceRelatedRecord {
                    record: identity.clone(),
                    relationship: relationship.to_string(),
                    related_record: Some(related.clone()),
                })
            }
            RelationshipData::HasMany(members) if members.contains(related) => {
                Some(RecordOperation::AddToRelatedRecords {
                    record: identity.clone(),
                    relationship: relationship.to_string(),
                    related_record: related.clone(),
                })
            }
            _ => None,
        }
    }

    /// Remove `related` from `identity.relationship`. A no-op when the record
    /// is missing or the member is not present.
    fn unlink(
        &mut self,
        identity: &RecordIdentity,
        relationship: &str,
        related: &RecordIdentity,
        symmetric: bool,
    ) {
        let Some(undo) = self.restore_operation(identity, relationship, related) else {
            return;
        };

        self.modify(identity, |record| {
            match record.relationships.get_mut(relationship) {
                Some(RelationshipData::HasOne(member)) => *member = None,
                Some(RelationshipData::HasMany(members)) => members.retain(|m| m != related),
                None => {}
            }
            if record
                .relationships
                .get(relationship)
                .is_some_and(RelationshipData::is_empty)
            {
                record.relationships.remove(relationship);
            }
        });
        self.inverse.push(undo);
        self.cache.remove_inverse_relationships(&[RecordRelationship::new(
            identity.clone(),
            relationship,
            related.clone(),
        )]);

        if symmetric {
            if let Some(inverse) = self.inverse_of(identity, relationship, related) {
                self.unlink(related, &inverse, identity, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{MemoryCache, SyncRecordCache};
    use orrery_core::{
        AttributeKind, CacheSettings, InboundEdgePolicy, ModelDefinition, OrreryError, Record,
        RecordIdentity, RecordOperation, RecordRelationship, RelationshipDefinition, Schema,
        TransformBuilder, ValidationError,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .model(
                    "star",
                    ModelDefinition::new()
                        .attribute("name", AttributeKind::String)
                        .relationship(
                            "planets",
                            RelationshipDefinition::has_many("planet").with_inverse("star"),
                        ),
                )
                .model(
                    "planet",
                    ModelDefinition::new()
                        .attribute("name", AttributeKind::String)
                        .attribute("order", AttributeKind::Number)
                        .key("remoteId")
                        .relationship(
                            "star",
                            RelationshipDefinition::has_one("star").with_inverse("planets"),
                        )
                        .relationship("neighbor", RelationshipDefinition::has_one("planet")),
                ),
        )
    }

    fn sol() -> RecordIdentity {
        RecordIdentity::new("star", "sol")
    }

    fn alpha() -> RecordIdentity {
        RecordIdentity::new("star", "alpha")
    }

    fn earth() -> RecordIdentity {
        RecordIdentity::new("planet", "earth")
    }

    fn mars() -> RecordIdentity {
        RecordIdentity::new("planet", "mars")
    }

    fn edge(record: RecordIdentity, relationship: &str, related: RecordIdentity) -> RecordRelationship {
        RecordRelationship::new(record, relationship, related)
    }

    fn undo(cache: &mut MemoryCache, inverse: &[RecordOperation]) {
        let reversed: Vec<_> = inverse.iter().rev().cloned().collect();
        cache.patch(&reversed).unwrap();
    }

    #[test]
    fn test_add_to_related_records_is_symmetric() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.add_to_related_records(sol(), "planets", earth())])
            .unwrap();

        assert_eq!(
            cache.get_inverse_relationships(&earth()),
            vec![edge(sol(), "planets", earth())]
        );
        assert_eq!(cache.get_record(&earth()).unwrap().has_one("star"), Some(&sol()));
        assert_eq!(
            cache.get_inverse_relationships(&sol()),
            vec![edge(earth(), "star", sol())]
        );
    }

    #[test]
    fn test_replace_related_record_steals_from_previous_owner() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.add_to_related_records(sol(), "planets", earth())])
            .unwrap();
        let before = cache.snapshot();

        let inverse = cache
            .patch(&[t.replace_related_record(earth(), "star", Some(alpha()))])
            .unwrap();

        assert!(cache.get_record(&sol()).unwrap().has_many("planets").is_empty());
        assert_eq!(cache.get_record(&alpha()).unwrap().has_many("planets"), &[earth()]);
        assert!(cache.get_inverse_relationships(&sol()).is_empty());

        undo(&mut cache, &inverse);
        assert!(cache.get_record(&alpha()).is_none());
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_one_way_relationship_skips_mirror() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.replace_related_record(earth(), "neighbor", Some(mars()))])
            .unwrap();

        assert!(cache.get_record(&mars()).is_none());
        assert_eq!(
            cache.get_inverse_relationships(&mars()),
            vec![edge(earth(), "neighbor", mars())]
        );
    }

    #[test]
    fn test_replace_attribute_inverse() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.add_record(Record::new("planet", "earth").with_attribute("name", "Earth"))])
            .unwrap();

        let inverse = cache
            .patch(&[t.replace_attribute(earth(), "name", "Terra")])
            .unwrap();
        assert_eq!(
            inverse,
            vec![t.replace_attribute(earth(), "name", "Earth")]
        );

        let inverse = cache
            .patch(&[t.replace_attribute(earth(), "order", 3)])
            .unwrap();
        assert_eq!(inverse, vec![t.replace_attribute(earth(), "order", serde_json::Value::Null)]);
    }

    #[test]
    fn test_validation_failure_leaves_no_trace() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        let before = cache.snapshot();

        let err = cache
            .patch(&[t.replace_attribute(earth(), "name", json!(42))])
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::AttributeKindMismatch { .. })
        ));

        let err = cache
            .patch(&[t.add_to_related_records(earth(), "star", sol())])
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::CardinalityMismatch { .. })
        ));
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_remove_record_prunes_inbound_edges() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[
                t.add_record(Record::new("star", "sol").with_attribute("name", "Sol")),
                t.add_to_related_records(sol(), "planets", earth()),
                t.replace_related_record(mars(), "neighbor", Some(earth())),
            ])
            .unwrap();
        let before = cache.snapshot();

        let inverse = cache.patch(&[t.remove_record(earth())]).unwrap();

        assert!(cache.get_record(&earth()).is_none());
        assert!(cache.get_record(&sol()).unwrap().has_many("planets").is_empty());
        assert_eq!(cache.get_record(&mars()).unwrap().has_one("neighbor"), None);
        assert!(cache.get_inverse_relationships(&earth()).is_empty());
        assert!(cache.get_inverse_relationships(&sol()).is_empty());

        undo(&mut cache, &inverse);
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_remove_record_retain_leaves_referrers() {
        let settings = CacheSettings::new().with_inbound_edge_policy(InboundEdgePolicy::Retain);
        let mut cache = MemoryCache::with_settings(schema(), settings);
        let t = TransformBuilder;
        cache
            .patch(&[t.add_to_related_records(sol(), "planets", earth())])
            .unwrap();

        cache.patch(&[t.remove_record(earth())]).unwrap();

        assert!(cache.get_record(&earth()).is_none());
        // The referrer still names earth and stays indexed; earth's own edge
        // to sol is gone.
        assert_eq!(cache.get_record(&sol()).unwrap().has_many("planets"), &[earth()]);
        assert_eq!(
            cache.get_inverse_relationships(&earth()),
            vec![edge(sol(), "planets", earth())]
        );
        assert!(cache.get_inverse_relationships(&sol()).is_empty());

        cache.patch(&[t.add_record(Record::new("planet", "earth"))]).unwrap();
        assert!(cache
            .inverse_index()
            .contains(&edge(sol(), "planets", earth())));
    }

    #[test]
    fn test_retain_removal_undoes_exactly() {
        let settings = CacheSettings::new().with_inbound_edge_policy(InboundEdgePolicy::Retain);
        let mut cache = MemoryCache::with_settings(schema(), settings);
        let t = TransformBuilder;
        cache
            .patch(&[
                t.add_to_related_records(sol(), "planets", earth()),
                t.replace_related_record(mars(), "neighbor", Some(earth())),
            ])
            .unwrap();
        let before = cache.snapshot();

        let inverse = cache.patch(&[t.remove_record(earth())]).unwrap();
        undo(&mut cache, &inverse);
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_stub_undo_keeps_earlier_one_way_referrers() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        // Earth is absent; mars points at it one way.
        cache
            .patch(&[t.replace_related_record(mars(), "neighbor", Some(earth()))])
            .unwrap();
        let before = cache.snapshot();

        // The mirror side creates earth as a stub.
        let inverse = cache
            .patch(&[t.add_to_related_records(sol(), "planets", earth())])
            .unwrap();
        assert!(cache.get_record(&earth()).is_some());
        undo(&mut cache, &inverse);

        assert!(cache.get_record(&earth()).is_none());
        assert_eq!(cache.get_record(&mars()).unwrap().has_one("neighbor"), Some(&earth()));
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_add_record_undo_keeps_earlier_one_way_referrers() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.replace_related_record(mars(), "neighbor", Some(earth()))])
            .unwrap();
        let before = cache.snapshot();

        let inverse = cache
            .patch(&[t.add_record(Record::new("planet", "earth").with_attribute("name", "Earth"))])
            .unwrap();
        assert_eq!(
            inverse,
            vec![
                t.replace_related_record(mars(), "neighbor", Some(earth())),
                t.remove_record(earth()),
            ]
        );
        undo(&mut cache, &inverse);
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_remove_absent_record_prunes_one_way_referrers() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.replace_related_record(mars(), "neighbor", Some(earth()))])
            .unwrap();
        let before = cache.snapshot();

        let inverse = cache.patch(&[t.remove_record(earth())]).unwrap();
        assert_eq!(cache.get_record(&mars()).unwrap().has_one("neighbor"), None);
        assert!(cache.get_inverse_relationships(&earth()).is_empty());

        undo(&mut cache, &inverse);
        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_update_record_merges() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        cache
            .patch(&[t.add_record(
                Record::new("planet", "earth")
                    .with_attribute("name", "Earth")
                    .with_attribute("order", 3)
                    .with_key("remoteId", "p3"),
            )])
            .unwrap();

        cache
            .patch(&[t.update_record(
                Record::new("planet", "earth")
                    .with_attribute("order", serde_json::Value::Null)
                    .with_has_one("star", Some(sol())),
            )])
            .unwrap();

        let earth = cache.get_record(&earth()).unwrap();
        assert_eq!(earth.attribute("name"), Some(&json!("Earth")));
        assert_eq!(earth.attribute("order"), None);
        assert_eq!(earth.key("remoteId"), Some("p3"));
        assert_eq!(earth.has_one("star"), Some(&sol()));
    }

    #[test]
    fn test_patch_atomic_rolls_back() {
        let mut cache = MemoryCache::new(schema());
        let t = TransformBuilder;
        let before = cache.snapshot();

        let result = cache.patch_atomic(&[
            t.add_record(Record::new("planet", "earth")),
            t.add_to_related_records(sol(), "planets", earth()),
            t.replace_attribute(earth(), "mass", 5.97),
        ]);

        assert!(result.is_err());
        assert_eq!(cache.snapshot(), before);
    }
}
