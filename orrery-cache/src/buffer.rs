//! Transform buffer: a change-tracking overlay around a [`MemoryCache`].
//!
//! Seed it from the authoritative cache, open a tracking session, patch it
//! like any cache, and close the session to get the [`RecordChangeset`] that
//! would bring the authoritative cache to the same state.

use crate::memory::MemoryCache;
use crate::traits::SyncRecordCache;
use orrery_core::{
    CacheSettings, CacheSnapshot, OrreryResult, Record, RecordChangeset, RecordIdentity,
    RecordRelationship, RecordSelection, Schema, TrackingError,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Effects recorded during a session, keyed like the primary state.
/// `None` / `false` mean "removed during the session".
#[derive(Debug, Default)]
struct Delta {
    records: BTreeMap<RecordIdentity, Option<Record>>,
    edges: BTreeMap<RecordRelationship, bool>,
}

impl Delta {
    fn into_changeset(self) -> RecordChangeset {
        let mut set_records = Vec::new();
        let mut remove_records = Vec::new();
        for (identity, record) in self.records {
            match record {
                Some(record) => set_records.push(record),
                None => remove_records.push(identity),
            }
        }

        let mut add_edges = Vec::new();
        let mut remove_edges = Vec::new();
        for (edge, present) in self.edges {
            if present {
                add_edges.push(edge);
            } else {
                remove_edges.push(edge);
            }
        }

        fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
            (!items.is_empty()).then_some(items)
        }
        RecordChangeset {
            set_records: non_empty(set_records),
            remove_records: non_empty(remove_records),
            add_inverse_relationships: non_empty(add_edges),
            remove_inverse_relationships: non_empty(remove_edges),
        }
    }
}

/// A [`SyncRecordCache`] that can record what changed between
/// [`start_tracking_changes`](TransformBuffer::start_tracking_changes) and
/// [`stop_tracking_changes`](TransformBuffer::stop_tracking_changes).
#[derive(Debug)]
pub struct TransformBuffer {
    cache: MemoryCache,
    delta: Option<Delta>,
}

impl TransformBuffer {
    pub fn new(schema: Arc<Schema>, settings: CacheSettings) -> Self {
        Self {
            cache: MemoryCache::with_settings(schema, settings),
            delta: None,
        }
    }

    /// Replace the buffer's full state. Resetting is never tracked.
    pub fn reset(&mut self, state: Option<CacheSnapshot>) {
        self.cache.reset(state);
    }

    pub fn is_tracking(&self) -> bool {
        self.delta.is_some()
    }

    /// Open a tracking session. Only one may be open at a time.
    pub fn start_tracking_changes(&mut self) -> OrreryResult<()> {
        if self.delta.is_some() {
            return Err(TrackingError::AlreadyTracking.into());
        }
        self.delta = Some(Delta::default());
        Ok(())
    }

    /// Close the session and return the net effect since it opened.
    pub fn stop_tracking_changes(&mut self) -> OrreryResult<RecordChangeset> {
        let delta = self.delta.take().ok_or(TrackingError::NotTracking)?;
        Ok(delta.into_changeset())
    }

    /// The wrapped cache.
    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    pub fn into_cache(self) -> MemoryCache {
        self.cache
    }
}

impl SyncRecordCache for TransformBuffer {
    fn schema(&self) -> &Arc<Schema> {
        self.cache.schema()
    }

    fn settings(&self) -> &CacheSettings {
        self.cache.settings()
    }

    fn get_record(&self, identity: &RecordIdentity) -> Option<&Record> {
        self.cache.get_record(identity)
    }

    fn get_records(&self, selection: &RecordSelection) -> Vec<Record> {
        self.cache.get_records(selection)
    }

    fn set_record(&mut self, record: Record) {
        if let Some(delta) = &mut self.delta {
            delta
                .records
                .insert(record.identity.clone(), Some(record.clone()));
        }
        self.cache.set_record(record);
    }

    fn remove_record(&mut self, identity: &RecordIdentity) -> Option<Record> {
        let removed = self.cache.remove_record(identity);
        if let Some(delta) = &mut self.delta {
            delta.records.insert(identity.clone(), None);
        }
        removed
    }

    fn get_inverse_relationships(&self, identity: &RecordIdentity) -> Vec<RecordRelationship> {
        self.cache.get_inverse_relationships(identity)
    }

    fn add_inverse_relationships(&mut self, edges: &[RecordRelationship]) {
        if let Some(delta) = &mut self.delta {
            for edge in edges {
                delta.edges.insert(edge.clone(), true);
            }
        }
        self.cache.add_inverse_relationships(edges);
    }

    fn remove_inverse_relationships(&mut self, edges: &[RecordRelationship]) {
        if let Some(delta) = &mut self.delta {
            for edge in edges {
                delta.edges.insert(edge.clone(), false);
            }
        }
        self.cache.remove_inverse_relationships(edges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_core::{
        ModelDefinition, OrreryError, RelationshipDefinition, TransformBuilder,
    };

    fn buffer() -> TransformBuffer {
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
                ModelDefinition::new().relationship(
                    "star",
                    RelationshipDefinition::has_one("star").with_inverse("planets"),
                ),
            );
        TransformBuffer::new(Arc::new(schema), CacheSettings::default())
    }

    #[test]
    fn test_tracking_session_errors() {
        let mut buffer = buffer();
        assert_eq!(
            buffer.stop_tracking_changes().unwrap_err(),
            OrreryError::Tracking(TrackingError::NotTracking)
        );
        buffer.start_tracking_changes().unwrap();
        assert_eq!(
            buffer.start_tracking_changes().unwrap_err(),
            OrreryError::Tracking(TrackingError::AlreadyTracking)
        );
        assert!(buffer.stop_tracking_changes().unwrap().is_empty());
        assert!(!buffer.is_tracking());
    }

    #[test]
    fn test_set_then_remove_keeps_only_removal() {
        let mut buffer = buffer();
        let t = TransformBuilder;
        let earth = RecordIdentity::new("planet", "earth");

        buffer.start_tracking_changes().unwrap();
        buffer
            .patch(&[
                t.add_record(Record::new("planet", "earth")),
                t.remove_record(earth.clone()),
            ])
            .unwrap();
        let changeset = buffer.stop_tracking_changes().unwrap();

        assert_eq!(changeset.remove_records(), &[earth]);
        assert!(changeset.set_records().is_empty());
    }

    #[test]
    fn test_changeset_replays_onto_seed() {
        let mut buffer = buffer();
        let t = TransformBuilder;
        let sol = RecordIdentity::new("star", "sol");
        let earth = RecordIdentity::new("planet", "earth");

        let mut authority = MemoryCache::new(Arc::clone(buffer.schema()));
        authority
            .patch(&[t.add_record(Record::new("star", "sol"))])
            .unwrap();

        buffer.reset(Some(authority.snapshot()));
        buffer.start_tracking_changes().unwrap();
        buffer
            .patch(&[t.add_to_related_records(sol.clone(), "planets", earth.clone())])
            .unwrap();
        let changeset = buffer.stop_tracking_changes().unwrap();

        assert_eq!(changeset.set_records().len(), 2);
        assert_eq!(changeset.add_inverse_relationships().len(), 2);
        assert!(changeset.remove_inverse_relationships().is_empty());

        authority.apply_record_changeset(&changeset);
        assert_eq!(authority.snapshot(), buffer.cache().snapshot());
        assert_eq!(
            authority.get_record(&earth).unwrap().has_one("star"),
            Some(&sol)
        );
    }
}
