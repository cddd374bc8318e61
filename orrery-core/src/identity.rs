//! Identity types for orrery records

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Canonical handle of a record: its type plus its id.
///
/// Identities are values. Every lookup in the cache, the inverse index and
/// the changeset is keyed by identity, never by a reference to a stored record.
/// Ordering is by type first and then by id, which gives type-scoped scans a
/// stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    #[serde(rename = "type")]
    pub record_type: String,
    pub id: String,
}

impl RecordIdentity {
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.id)
    }
}

/// One directed edge: `record`'s relationship `relationship` points at
/// `related_record`.
///
/// The inverse relationship index stores these keyed by `related_record`
/// so "who points at me" is a direct lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRelationship {
    pub record: RecordIdentity,
    pub relationship: String,
    pub related_record: RecordIdentity,
}

impl RecordRelationship {
    pub fn new(
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: RecordIdentity,
    ) -> Self {
        Self {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }
}

/// Generate a new request id (UUIDv7, timestamp-sortable).
pub fn new_request_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_serializes_type_field() {
        let identity = RecordIdentity::new("planet", "jupiter");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json, serde_json::json!({"type": "planet", "id": "jupiter"}));
        assert_eq!(identity.to_string(), "planet:jupiter");
    }

    #[test]
    fn test_identity_orders_by_type_then_id() {
        let a = RecordIdentity::new("moon", "z");
        let b = RecordIdentity::new("planet", "a");
        let c = RecordIdentity::new("planet", "b");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }
}
