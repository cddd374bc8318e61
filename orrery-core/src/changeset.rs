//! Changesets and snapshots: the exchange formats between a transform
//! buffer, the cache, and collaborators that persist or broadcast diffs.

use crate::identity::{RecordIdentity, RecordRelationship};
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// A minimal diff. Only entities that changed appear; an absent field
/// means "no change of that kind".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChangeset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_records: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_records: Option<Vec<RecordIdentity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_inverse_relationships: Option<Vec<RecordRelationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_inverse_relationships: Option<Vec<RecordRelationship>>,
}

impl RecordChangeset {
    pub fn is_empty(&self) -> bool {
        fn empty<T>(field: &Option<Vec<T>>) -> bool {
            field.as_ref().map_or(true, Vec::is_empty)
        }
        empty(&self.set_records)
            && empty(&self.remove_records)
            && empty(&self.add_inverse_relationships)
            && empty(&self.remove_inverse_relationships)
    }

    pub fn set_records(&self) -> &[Record] {
        self.set_records.as_deref().unwrap_or_default()
    }

    pub fn remove_records(&self) -> &[RecordIdentity] {
        self.remove_records.as_deref().unwrap_or_default()
    }

    pub fn add_inverse_relationships(&self) -> &[RecordRelationship] {
        self.add_inverse_relationships.as_deref().unwrap_or_default()
    }

    pub fn remove_inverse_relationships(&self) -> &[RecordRelationship] {
        self.remove_inverse_relationships
            .as_deref()
            .unwrap_or_default()
    }
}

/// Full state of a cache: every record and every inverse edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub records: Vec<Record>,
    pub inverse_relationships: Vec<RecordRelationship>,
}
