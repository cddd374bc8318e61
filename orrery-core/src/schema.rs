//! Schema input: per record type, its attributes, keys and relationships.
//!
//! The schema is supplied by an external collaborator (usually deserialized
//! from JSON). The cache consults it to validate operations and to decide
//! when a relationship change must also update the inverse side.

use crate::error::{OrreryResult, ValidationError};
use crate::identity::RecordIdentity;
use crate::record::{Record, RelationshipData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Declared value kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Accepts any JSON value.
    Any,
}

impl AttributeKind {
    /// Whether `value` is acceptable for this kind. `null` always is.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (AttributeKind::Any, _) => true,
            (AttributeKind::String, Value::String(_)) => true,
            (AttributeKind::Number, Value::Number(_)) => true,
            (AttributeKind::Boolean, Value::Bool(_)) => true,
            (AttributeKind::Object, Value::Object(_)) => true,
            (AttributeKind::Array, Value::Array(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "type", default = "default_attribute_kind")]
    pub kind: AttributeKind,
}

fn default_attribute_kind() -> AttributeKind {
    AttributeKind::Any
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    HasOne,
    HasMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub kind: RelationshipKind,
    /// Record types this relationship may point at.
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// Name of the relationship on the related type that mirrors this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
}

impl RelationshipDefinition {
    pub fn has_one(related_type: impl Into<String>) -> Self {
        Self {
            kind: RelationshipKind::HasOne,
            types: vec![related_type.into()],
            inverse: None,
        }
    }

    pub fn has_many(related_type: impl Into<String>) -> Self {
        Self {
            kind: RelationshipKind::HasMany,
            types: vec![related_type.into()],
            inverse: None,
        }
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn with_type(mut self, related_type: impl Into<String>) -> Self {
        self.types.push(related_type.into());
        self
    }

    pub fn allows(&self, record_type: &str) -> bool {
        self.types.iter().any(|t| t == record_type)
    }
}

/// Definition of one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDefinition>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipDefinition>,
    #[serde(default)]
    pub keys: BTreeSet<String>,
}

impl ModelDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes
            .insert(name.into(), AttributeDefinition { kind });
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, definition: RelationshipDefinition) -> Self {
        self.relationships.insert(name.into(), definition);
        self
    }

    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.keys.insert(name.into());
        self
    }
}

/// Record type → model definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub models: BTreeMap<String, ModelDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, record_type: impl Into<String>, definition: ModelDefinition) -> Self {
        self.models.insert(record_type.into(), definition);
        self
    }

    pub fn has_model(&self, record_type: &str) -> bool {
        self.models.contains_key(record_type)
    }

    pub fn get_model(&self, record_type: &str) -> OrreryResult<&ModelDefinition> {
        self.models.get(record_type).ok_or_else(|| {
            ValidationError::UnknownType {
                record_type: record_type.to_string(),
            }
            .into()
        })
    }

    pub fn get_relationship(
        &self,
        record_type: &str,
        relationship: &str,
    ) -> OrreryResult<&RelationshipDefinition> {
        self.get_model(record_type)?
            .relationships
            .get(relationship)
            .ok_or_else(|| {
                ValidationError::UnknownRelationship {
                    record_type: record_type.to_string(),
                    relationship: relationship.to_string(),
                }
                .into()
            })
    }

    /// Inverse relationship name for `record_type.relationship`, if it is
    /// declared *and* materialized on `related_type`.
    ///
    /// One-way relationships (no inverse, or an inverse the related type
    /// does not define) return `None`.
    pub fn materialized_inverse(
        &self,
        record_type: &str,
        relationship: &str,
        related_type: &str,
    ) -> Option<&str> {
        let inverse = self
            .models
            .get(record_type)?
            .relationships
            .get(relationship)?
            .inverse
            .as_deref()?;
        self.models
            .get(related_type)?
            .relationships
            .contains_key(inverse)
            .then_some(inverse)
    }

    /// Check that an identity names a known type.
    pub fn validate_identity(&self, identity: &RecordIdentity) -> OrreryResult<()> {
        if identity.id.is_empty() {
            return Err(ValidationError::MissingId {
                record_type: identity.record_type.clone(),
            }
            .into());
        }
        self.get_model(&identity.record_type).map(|_| ())
    }

    /// Check an attribute name (and, when `check_kind`, its value) against the model.
    pub fn validate_attribute(
        &self,
        record_type: &str,
        attribute: &str,
        value: &Value,
        check_kind: bool,
    ) -> OrreryResult<()> {
        let model = self.get_model(record_type)?;
        let definition =
            model
                .attributes
                .get(attribute)
                .ok_or_else(|| ValidationError::UnknownAttribute {
                    record_type: record_type.to_string(),
                    attribute: attribute.to_string(),
                })?;
        if check_kind && !definition.kind.accepts(value) {
            return Err(ValidationError::AttributeKindMismatch {
                record_type: record_type.to_string(),
                attribute: attribute.to_string(),
                expected: definition.kind,
            }
            .into());
        }
        Ok(())
    }

    pub fn validate_key(&self, record_type: &str, key: &str) -> OrreryResult<()> {
        if self.get_model(record_type)?.keys.contains(key) {
            Ok(())
        } else {
            Err(ValidationError::UnknownKey {
                record_type: record_type.to_string(),
                key: key.to_string(),
            }
            .into())
        }
    }

    /// Check that `relationship` exists on `record_type` with the expected
    /// cardinality and that every related identity has an allowed type.
    pub fn validate_relationship<'a>(
        &self,
        record_type: &str,
        relationship: &str,
        expected: Option<RelationshipKind>,
        related: impl IntoIterator<Item = &'a RecordIdentity>,
    ) -> OrreryResult<()> {
        let definition = self.get_relationship(record_type, relationship)?;
        if let Some(expected) = expected {
            if definition.kind != expected {
                return Err(ValidationError::CardinalityMismatch {
                    record_type: record_type.to_string(),
                    relationship: relationship.to_string(),
                    declared: definition.kind,
                }
                .into());
            }
        }
        for identity in related {
            self.validate_identity(identity)?;
            if !definition.allows(&identity.record_type) {
                return Err(ValidationError::DisallowedRelatedType {
                    record_type: record_type.to_string(),
                    relationship: relationship.to_string(),
                    related_type: identity.record_type.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate a full record: identity, every attribute, key and relationship.
    pub fn validate_record(&self, record: &Record, check_kinds: bool) -> OrreryResult<()> {
        self.validate_identity(&record.identity)?;
        let record_type = record.record_type();
        for (name, value) in &record.attributes {
            self.validate_attribute(record_type, name, value, check_kinds)?;
        }
        for name in record.keys.keys() {
            self.validate_key(record_type, name)?;
        }
        for (name, data) in &record.relationships {
            let kind = match data {
                RelationshipData::HasOne(_) => RelationshipKind::HasOne,
                RelationshipData::HasMany(_) => RelationshipKind::HasMany,
            };
            self.validate_relationship(record_type, name, Some(kind), data.members())?;
        }
        Ok(())
    }

    /// Structural consistency of the schema itself.
    ///
    /// Every relationship target type must be defined, and every inverse that
    /// is materialized on the related type must list the owning type among
    /// its own targets and name this relationship back (when it names one).
    pub fn validate(&self) -> OrreryResult<()> {
        for (record_type, model) in &self.models {
            for (name, definition) in &model.relationships {
                if definition.types.is_empty() {
                    return Err(ValidationError::InvalidSchema {
                        reason: format!("{record_type}.{name} declares no related type"),
                    }
                    .into());
                }
                for related_type in &definition.types {
                    let related_model = self.models.get(related_type).ok_or_else(|| {
                        ValidationError::InvalidSchema {
                            reason: format!(
                                "{record_type}.{name} points at undefined type {related_type}"
                            ),
                        }
                    })?;
                    let Some(inverse) = definition.inverse.as_deref() else {
                        continue;
                    };
                    let Some(inverse_definition) = related_model.relationships.get(inverse) else {
                        continue;
                    };
                    if !inverse_definition.allows(record_type) {
                        return Err(ValidationError::InvalidSchema {
                            reason: format!(
                                "{related_type}.{inverse} is the inverse of {record_type}.{name} but does not allow {record_type}"
                            ),
                        }
                        .into());
                    }
                    if let Some(back) = inverse_definition.inverse.as_deref() {
                        if back != name {
                            return Err(ValidationError::InvalidSchema {
                                reason: format!(
                                    "{related_type}.{inverse} names inverse {back}, expected {name}"
                                ),
                            }
                            .into());
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrreryError;
    use serde_json::json;

    fn schema() -> Schema {
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
                    .key("remoteId")
                    .relationship(
                        "star",
                        RelationshipDefinition::has_one("star").with_inverse("planets"),
                    )
                    .relationship(
                        "discoveredBy",
                        RelationshipDefinition::has_one("star").with_inverse("discoveries"),
                    ),
            )
    }

    #[test]
    fn test_schema_deserializes_from_json() {
        let parsed: Schema = serde_json::from_value(json!({
            "models": {
                "star": {
                    "attributes": {"name": {"type": "string"}},
                    "relationships": {
                        "planets": {"kind": "hasMany", "type": ["planet"], "inverse": "star"}
                    }
                },
                "planet": {
                    "relationships": {
                        "star": {"kind": "hasOne", "type": ["star"], "inverse": "planets"}
                    }
                }
            }
        }))
        .unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(
            parsed.get_relationship("planet", "star").unwrap().kind,
            RelationshipKind::HasOne
        );
    }

    #[test]
    fn test_materialized_inverse_skips_one_way() {
        let schema = schema();
        assert_eq!(
            schema.materialized_inverse("star", "planets", "planet"),
            Some("star")
        );
        // star does not define "discoveries", so the relationship is one-way.
        assert_eq!(schema.materialized_inverse("planet", "discoveredBy", "star"), None);
    }

    #[test]
    fn test_validate_relationship_errors() {
        let schema = schema();
        let sol = RecordIdentity::new("star", "sol");
        let earth = RecordIdentity::new("planet", "earth");

        let err = schema
            .validate_relationship("planet", "star", Some(RelationshipKind::HasMany), [&sol])
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::CardinalityMismatch { .. })
        ));

        let err = schema
            .validate_relationship("planet", "star", None, [&earth])
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::DisallowedRelatedType { .. })
        ));

        let err = schema
            .validate_relationship("planet", "moons", None, [])
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn test_validate_attribute_kind() {
        let schema = schema();
        assert!(schema
            .validate_attribute("planet", "name", &json!("Earth"), true)
            .is_ok());
        assert!(schema
            .validate_attribute("planet", "name", &Value::Null, true)
            .is_ok());
        assert!(schema
            .validate_attribute("planet", "name", &json!(3), true)
            .is_err());
        assert!(schema
            .validate_attribute("planet", "name", &json!(3), false)
            .is_ok());
        assert!(schema
            .validate_attribute("planet", "mass", &json!(3), false)
            .is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_inverse() {
        let broken = Schema::new()
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
                    RelationshipDefinition::has_one("planet").with_inverse("planets"),
                ),
            );
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_polymorphic_relationship_types() {
        let schema = Schema::new()
            .model("planet", ModelDefinition::new())
            .model("moon", ModelDefinition::new())
            .model(
                "telescope",
                ModelDefinition::new().relationship(
                    "targets",
                    RelationshipDefinition::has_many("planet").with_type("moon"),
                ),
            );
        assert!(schema.has_model("telescope"));
        assert!(!schema.has_model("star"));

        let luna = RecordIdentity::new("moon", "luna");
        let earth = RecordIdentity::new("planet", "earth");
        assert!(schema
            .validate_relationship("telescope", "targets", None, [&luna, &earth])
            .is_ok());
        assert!(schema
            .validate_relationship("telescope", "targets", None, [&RecordIdentity::new("star", "sol")])
            .is_err());
    }

    #[test]
    fn test_validate_identity_requires_id() {
        let schema = schema();
        assert!(schema
            .validate_identity(&RecordIdentity::new("planet", ""))
            .is_err());
        assert!(schema
            .validate_identity(&RecordIdentity::new("comet", "halley"))
            .is_err());
    }
}
