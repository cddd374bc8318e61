//! Inverse relationship index: related record → edges pointing at it.

use orrery_core::{RecordIdentity, RecordRelationship};
use std::collections::{BTreeMap, BTreeSet};

/// Edges keyed by the record they point at, so "who points at me" is a
/// single lookup instead of a scan over every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InverseRelationshipIndex {
    edges: BTreeMap<RecordIdentity, BTreeSet<RecordRelationship>>,
}

impl InverseRelationshipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge. Returns `false` if it was already indexed.
    pub fn add(&mut self, edge: RecordRelationship) -> bool {
        self.edges
            .entry(edge.related_record.clone())
            .or_default()
            .insert(edge)
    }

    /// Remove an edge. Returns `false` if it was not indexed.
    pub fn remove(&mut self, edge: &RecordRelationship) -> bool {
        let Some(set) = self.edges.get_mut(&edge.related_record) else {
            return false;
        };
        let removed = set.remove(edge);
        if set.is_empty() {
            self.edges.remove(&edge.related_record);
        }
        removed
    }

    pub fn contains(&self, edge: &RecordRelationship) -> bool {
        self.edges
            .get(&edge.related_record)
            .is_some_and(|set| set.contains(edge))
    }

    /// Edges pointing at `identity`.
    pub fn pointing_at(&self, identity: &RecordIdentity) -> Vec<RecordRelationship> {
        self.edges
            .get(identity)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every indexed edge.
    pub fn iter(&self) -> impl Iterator<Item = &RecordRelationship> {
        self.edges.values().flatten()
    }

    /// Number of indexed edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of records with at least one inbound edge.
    pub fn entry_count(&self) -> usize {
        self.edges.len()
    }
}

impl FromIterator<RecordRelationship> for InverseRelationshipIndex {
    fn from_iter<I: IntoIterator<Item = RecordRelationship>>(iter: I) -> Self {
        let mut index = Self::new();
        for edge in iter {
            index.add(edge);
        }
        index
    }
}
