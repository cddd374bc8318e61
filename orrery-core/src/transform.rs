//! Request envelopes (transforms and queries) and their builders.

use crate::error::{OrreryResult, ValidationError};
use crate::identity::{new_request_id, RecordIdentity};
use crate::operation::RecordOperation;
use crate::query::{QueryExpression, RecordSelection};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-request options shared by transforms and queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    /// Return the full response envelope instead of the bare data.
    #[serde(default)]
    pub full_response: bool,
    /// Fail single-record lookups on a miss instead of resolving to absent.
    /// `None` defers to the source's configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raise_not_found: Option<bool>,
}

impl RequestOptions {
    pub fn full() -> Self {
        Self {
            full_response: true,
            ..Self::default()
        }
    }

    pub fn strict() -> Self {
        Self {
            raise_not_found: Some(true),
            ..Self::default()
        }
    }

    pub fn with_full_response(mut self, full: bool) -> Self {
        self.full_response = full;
        self
    }

    pub fn with_raise_not_found(mut self, raise: bool) -> Self {
        self.raise_not_found = Some(raise);
        self
    }
}

/// An ordered, identified batch of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub id: String,
    pub operations: Vec<RecordOperation>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl Transform {
    /// Wrap operations in a transform with a fresh id.
    pub fn new(operations: Vec<RecordOperation>) -> Self {
        Self {
            id: new_request_id(),
            operations,
            options: RequestOptions::default(),
        }
    }

    /// Build a transform from a builder closure.
    pub fn build(f: impl FnOnce(&TransformBuilder) -> Vec<RecordOperation>) -> Self {
        Self::new(f(&TransformBuilder))
    }

    /// Use a caller-supplied id (retries reuse the id of the first attempt).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject envelopes that cannot be admitted.
    pub fn validate(&self) -> OrreryResult<()> {
        if self.id.is_empty() {
            return Err(ValidationError::MalformedRequest {
                reason: "transform id is empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl From<RecordOperation> for Transform {
    fn from(operation: RecordOperation) -> Self {
        Transform::new(vec![operation])
    }
}

impl From<Vec<RecordOperation>> for Transform {
    fn from(operations: Vec<RecordOperation>) -> Self {
        Transform::new(operations)
    }
}

/// An ordered, identified batch of query expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub expressions: Vec<QueryExpression>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl Query {
    pub fn new(expressions: Vec<QueryExpression>) -> Self {
        Self {
            id: new_request_id(),
            expressions,
            options: RequestOptions::default(),
        }
    }

    pub fn build(f: impl FnOnce(&QueryBuilder) -> QueryExpression) -> Self {
        Self::new(vec![f(&QueryBuilder)])
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// A query with exactly one expression resolves to a single result.
    pub fn is_single(&self) -> bool {
        self.expressions.len() == 1
    }

    pub fn validate(&self) -> OrreryResult<()> {
        if self.id.is_empty() {
            return Err(ValidationError::MalformedRequest {
                reason: "query id is empty".to_string(),
            }
            .into());
        }
        if self.expressions.is_empty() {
            return Err(ValidationError::MalformedRequest {
                reason: format!("query {} has no expressions", self.id),
            }
            .into());
        }
        Ok(())
    }
}

impl From<QueryExpression> for Query {
    fn from(expression: QueryExpression) -> Self {
        Query::new(vec![expression])
    }
}

impl From<Vec<QueryExpression>> for Query {
    fn from(expressions: Vec<QueryExpression>) -> Self {
        Query::new(expressions)
    }
}

/// Builds record operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformBuilder;

impl TransformBuilder {
    pub fn add_record(&self, record: Record) -> RecordOperation {
        RecordOperation::AddRecord { record }
    }

    pub fn update_record(&self, record: Record) -> RecordOperation {
        RecordOperation::UpdateRecord { record }
    }

    pub fn remove_record(&self, record: RecordIdentity) -> RecordOperation {
        RecordOperation::RemoveRecord { record }
    }

    pub fn replace_attribute(
        &self,
        record: RecordIdentity,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> RecordOperation {
        RecordOperation::ReplaceAttribute {
            record,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn replace_key(
        &self,
        record: RecordIdentity,
        key: impl Into<String>,
        value: Option<String>,
    ) -> RecordOperation {
        RecordOperation::ReplaceKey {
            record,
            key: key.into(),
            value,
        }
    }

    pub fn replace_related_record(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: Option<RecordIdentity>,
    ) -> RecordOperation {
        RecordOperation::ReplaceRelatedRecord {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }

    pub fn replace_related_records(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_records: Vec<RecordIdentity>,
    ) -> RecordOperation {
        RecordOperation::ReplaceRelatedRecords {
            record,
            relationship: relationship.into(),
            related_records,
        }
    }

    pub fn add_to_related_records(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: RecordIdentity,
    ) -> RecordOperation {
        RecordOperation::AddToRelatedRecords {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }

    pub fn remove_from_related_records(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
        related_record: RecordIdentity,
    ) -> RecordOperation {
        RecordOperation::RemoveFromRelatedRecords {
            record,
            relationship: relationship.into(),
            related_record,
        }
    }
}

/// Builds query expressions; refine collection expressions with
/// [`QueryExpression::filter`], [`QueryExpression::sort`] and [`QueryExpression::page`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn find_record(&self, record: RecordIdentity) -> QueryExpression {
        QueryExpression::FindRecord { record }
    }

    /// All records of a type.
    pub fn find_records(&self, record_type: impl Into<String>) -> QueryExpression {
        QueryExpression::FindRecords {
            records: RecordSelection::OfType(record_type.into()),
            filter: Vec::new(),
            sort: Vec::new(),
            page: None,
        }
    }

    /// The listed records that are present.
    pub fn find_records_of(&self, records: Vec<RecordIdentity>) -> QueryExpression {
        QueryExpression::FindRecords {
            records: RecordSelection::Identities(records),
            filter: Vec::new(),
            sort: Vec::new(),
            page: None,
        }
    }

    pub fn find_related_record(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
    ) -> QueryExpression {
        QueryExpression::FindRelatedRecord {
            record,
            relationship: relationship.into(),
        }
    }

    pub fn find_related_records(
        &self,
        record: RecordIdentity,
        relationship: impl Into<String>,
    ) -> QueryExpression {
        QueryExpression::FindRelatedRecords {
            record,
            relationship: relationship.into(),
            filter: Vec::new(),
            sort: Vec::new(),
            page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;

    #[test]
    fn test_transform_build_assigns_id() {
        let transform = Transform::build(|t| {
            vec![
                t.add_record(Record::new("planet", "jupiter").with_attribute("name", "Jupiter")),
                t.replace_attribute(RecordIdentity::new("planet", "jupiter"), "name", "Zeus"),
            ]
        });
        assert!(!transform.id.is_empty());
        assert_eq!(transform.operations.len(), 2);
        assert!(transform.validate().is_ok());
        assert!(transform.with_id("").validate().is_err());
    }

    #[test]
    fn test_query_build_and_single_shape() {
        let query = Query::build(|q| q.find_records("planet").sort("name", SortOrder::Ascending))
            .with_options(RequestOptions::full());
        assert!(query.is_single());
        assert!(query.options.full_response);
        assert!(query.validate().is_ok());
        assert!(Query::new(vec![]).validate().is_err());
    }

    #[test]
    fn test_request_options_serde_defaults() {
        let options: RequestOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, RequestOptions::default());
        let strict = RequestOptions::strict().with_full_response(true);
        assert_eq!(strict.raise_not_found, Some(true));
        assert!(strict.full_response);
    }
}
