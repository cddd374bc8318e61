//! Record model: attributes, keys and relationships around an identity.

use crate::identity::{RecordIdentity, RecordRelationship};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value of one relationship field.
///
/// Serialized untagged: a to-many relationship is a JSON array of
/// identities, a to-one relationship is an identity object or `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    HasMany(Vec<RecordIdentity>),
    HasOne(Option<RecordIdentity>),
}

impl RelationshipData {
    /// Iterate over every related identity.
    pub fn members(&self) -> impl Iterator<Item = &RecordIdentity> {
        let (one, many) = match self {
            RelationshipData::HasOne(one) => (one.as_ref(), &[][..]),
            RelationshipData::HasMany(many) => (None, many.as_slice()),
        };
        one.into_iter().chain(many.iter())
    }

    pub fn contains(&self, identity: &RecordIdentity) -> bool {
        self.members().any(|member| member == identity)
    }

    pub fn is_empty(&self) -> bool {
        self.members().next().is_none()
    }

    pub fn is_has_many(&self) -> bool {
        matches!(self, RelationshipData::HasMany(_))
    }
}

/// To-many relationships are unordered sets: equality ignores member order
/// and repeats.
impl PartialEq for RelationshipData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelationshipData::HasOne(a), RelationshipData::HasOne(b)) => a == b,
            (RelationshipData::HasMany(a), RelationshipData::HasMany(b)) => {
                a.iter().all(|member| b.contains(member)) && b.iter().all(|member| a.contains(member))
            }
            _ => false,
        }
    }
}

impl Eq for RelationshipData {}

/// A typed entity with an identity, attributes, keys and relationships.
///
/// A `null` attribute means "unset" and an empty relationship means
/// "not related"; [`Record::normalize`] strips both, and equality treats
/// them as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub identity: RecordIdentity,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipData>,
}

impl Record {
    /// Create an identity-only record.
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::from_identity(RecordIdentity::new(record_type, id))
    }

    pub fn from_identity(identity: RecordIdentity) -> Self {
        Self {
            identity,
            attributes: BTreeMap::new(),
            keys: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(name.into(), value.into());
        self
    }

    pub fn with_has_one(mut self, name: impl Into<String>, related: Option<RecordIdentity>) -> Self {
        self.relationships
            .insert(name.into(), RelationshipData::HasOne(related));
        self
    }

    pub fn with_has_many(mut self, name: impl Into<String>, related: Vec<RecordIdentity>) -> Self {
        self.relationships
            .insert(name.into(), RelationshipData::HasMany(related));
        self
    }

    pub fn record_type(&self) -> &str {
        &self.identity.record_type
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|value| !value.is_null())
    }

    pub fn key(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipData> {
        self.relationships.get(name)
    }

    /// Related identity of a to-one relationship.
    pub fn has_one(&self, name: &str) -> Option<&RecordIdentity> {
        match self.relationships.get(name) {
            Some(RelationshipData::HasOne(related)) => related.as_ref(),
            _ => None,
        }
    }

    /// Members of a to-many relationship (empty when unset).
    pub fn has_many(&self, name: &str) -> &[RecordIdentity] {
        match self.relationships.get(name) {
            Some(RelationshipData::HasMany(related)) => related,
            _ => &[],
        }
    }

    /// Every outbound edge of this record, one per related member.
    pub fn outbound_edges(&self) -> Vec<RecordRelationship> {
        self.relationships
            .iter()
            .flat_map(|(name, data)| {
                data.members().map(move |related| {
                    RecordRelationship::new(self.identity.clone(), name.clone(), related.clone())
                })
            })
            .collect()
    }

    /// Strip unset attributes and empty relationships, sort and dedupe
    /// to-many members.
    pub fn normalize(&mut self) {
        self.attributes.retain(|_, value| !value.is_null());
        for data in self.relationships.values_mut() {
            if let RelationshipData::HasMany(members) = data {
                members.sort();
                members.dedup();
            }
        }
        self.relationships.retain(|_, data| !data.is_empty());
    }

    /// Normalized copy.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        fn set_attributes(record: &Record) -> impl Iterator<Item = (&String, &Value)> {
            record.attributes.iter().filter(|(_, value)| !value.is_null())
        }
        fn set_relationships(record: &Record) -> impl Iterator<Item = (&String, &RelationshipData)> {
            record.relationships.iter().filter(|(_, data)| !data.is_empty())
        }

        self.identity == other.identity
            && self.keys == other.keys
            && set_attributes(self).eq(set_attributes(other))
            && set_relationships(self).eq(set_relationships(other))
    }
}

impl Eq for Record {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn earth() -> RecordIdentity {
        RecordIdentity::new("planet", "earth")
    }

    fn mars() -> RecordIdentity {
        RecordIdentity::new("planet", "mars")
    }

    #[test]
    fn test_has_many_equality_ignores_order() {
        let a = RelationshipData::HasMany(vec![earth(), mars()]);
        let b = RelationshipData::HasMany(vec![mars(), earth()]);
        assert_eq!(a, b);
        assert_ne!(a, RelationshipData::HasMany(vec![earth()]));
        assert_ne!(RelationshipData::HasOne(None), RelationshipData::HasMany(vec![]));
    }

    #[test]
    fn test_record_equality_treats_null_and_empty_as_absent() {
        let plain = Record::new("star", "sol").with_attribute("name", "Sol");
        let noisy = Record::new("star", "sol")
            .with_attribute("name", "Sol")
            .with_attribute("mass", Value::Null)
            .with_has_many("planets", vec![])
            .with_has_one("system", None);
        assert_eq!(plain, noisy);
    }

    #[test]
    fn test_normalize_sorts_and_dedupes_members() {
        let record = Record::new("star", "sol")
            .with_has_many("planets", vec![mars(), earth(), mars(), earth()])
            .with_attribute("gone", Value::Null)
            .normalized();
        assert_eq!(record.has_many("planets"), &[earth(), mars()]);
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn test_outbound_edges() {
        let record = Record::new("star", "sol").with_has_many("planets", vec![earth(), mars()]);
        let edges = record.outbound_edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|edge| edge.relationship == "planets"));
        assert_eq!(edges[0].related_record, earth());
    }

    #[test]
    fn test_record_json_shape() {
        let record: Record = serde_json::from_value(json!({
            "type": "planet",
            "id": "earth",
            "attributes": {"name": "Earth"},
            "relationships": {"star": {"type": "star", "id": "sol"}, "moons": []}
        }))
        .unwrap();
        assert_eq!(record.identity, earth());
        assert_eq!(record.has_one("star"), Some(&RecordIdentity::new("star", "sol")));
        assert!(record.relationship("moons").unwrap().is_has_many());
        assert_eq!(record.attribute("name"), Some(&json!("Earth")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn identity_strategy() -> impl Strategy<Value = RecordIdentity> {
            ("[a-c]", "[a-e]").prop_map(|(t, id)| RecordIdentity::new(t, id))
        }

        fn record_strategy() -> impl Strategy<Value = Record> {
            (
                prop::collection::btree_map("[a-d]", prop_oneof![Just(Value::Null), any::<i32>().prop_map(Value::from)], 0..4),
                prop::collection::vec(identity_strategy(), 0..5),
                prop::option::of(identity_strategy()),
            )
                .prop_map(|(attributes, many, one)| {
                    let mut record = Record::new("star", "sol")
                        .with_has_many("many", many)
                        .with_has_one("one", one);
                    record.attributes = attributes;
                    record
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Normalizing never changes what a record means.
            #[test]
            fn prop_normalize_preserves_equality(record in record_strategy()) {
                let normalized = record.clone().normalized();
                prop_assert_eq!(&normalized, &record);
                prop_assert_eq!(normalized.clone().normalized(), normalized);
            }
        }
    }
}
