//! Query expressions.
//!
//! Queries are plain structured requests; nothing here parses a query
//! language. Evaluation lives with the record cache.

use crate::identity::RecordIdentity;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison applied by an attribute filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Equal,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Set comparison applied by relationship filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetComparisonOperator {
    /// Exactly the given members.
    Equal,
    /// Contains every given member.
    All,
    /// Contains at least one given member.
    Some,
    /// Contains none of the given members (or is empty when none are given).
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterSpecifier {
    Attribute {
        attribute: String,
        op: ComparisonOperator,
        value: Value,
    },
    RelatedRecord {
        relationship: String,
        op: SetComparisonOperator,
        records: Vec<RecordIdentity>,
    },
    RelatedRecords {
        relationship: String,
        op: SetComparisonOperator,
        records: Vec<RecordIdentity>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpecifier {
    pub attribute: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpecifier {
    #[serde(default)]
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Which records a `findRecords` expression starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSelection {
    OfType(String),
    Identities(Vec<RecordIdentity>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum QueryExpression {
    FindRecord {
        record: RecordIdentity,
    },
    FindRecords {
        records: RecordSelection,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filter: Vec<FilterSpecifier>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sort: Vec<SortSpecifier>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<PageSpecifier>,
    },
    FindRelatedRecord {
        record: RecordIdentity,
        relationship: String,
    },
    FindRelatedRecords {
        record: RecordIdentity,
        relationship: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filter: Vec<FilterSpecifier>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sort: Vec<SortSpecifier>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<PageSpecifier>,
    },
}

impl QueryExpression {
    /// Wire name of the expression kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryExpression::FindRecord { .. } => "findRecord",
            QueryExpression::FindRecords { .. } => "findRecords",
            QueryExpression::FindRelatedRecord { .. } => "findRelatedRecord",
            QueryExpression::FindRelatedRecords { .. } => "findRelatedRecords",
        }
    }

    /// Add a filter to a `findRecords`/`findRelatedRecords` expression.
    /// Single-record expressions are returned unchanged.
    pub fn filter(mut self, specifier: FilterSpecifier) -> Self {
        if let QueryExpression::FindRecords { filter, .. }
        | QueryExpression::FindRelatedRecords { filter, .. } = &mut self
        {
            filter.push(specifier);
        }
        self
    }

    pub fn filter_attribute(
        self,
        attribute: impl Into<String>,
        op: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.filter(FilterSpecifier::Attribute {
            attribute: attribute.into(),
            op,
            value: value.into(),
        })
    }

    pub fn sort(mut self, attribute: impl Into<String>, order: SortOrder) -> Self {
        if let QueryExpression::FindRecords { sort, .. }
        | QueryExpression::FindRelatedRecords { sort, .. } = &mut self
        {
            sort.push(SortSpecifier {
                attribute: attribute.into(),
                order,
            });
        }
        self
    }

    pub fn page(mut self, offset: usize, limit: Option<usize>) -> Self {
        if let QueryExpression::FindRecords { page, .. }
        | QueryExpression::FindRelatedRecords { page, .. } = &mut self
        {
            *page = Some(PageSpecifier { offset, limit });
        }
        self
    }
}

/// Result of one query expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Records(Vec<Record>),
    Record(Option<Record>),
}

impl QueryResult {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            QueryResult::Record(record) => record.as_ref(),
            QueryResult::Records(_) => None,
        }
    }

    pub fn as_records(&self) -> &[Record] {
        match self {
            QueryResult::Records(records) => records,
            QueryResult::Record(_) => &[],
        }
    }

    /// Every record in the result, whatever its shape.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            QueryResult::Records(records) => records,
            QueryResult::Record(record) => record.into_iter().collect(),
        }
    }
}

/// Total-enough ordering for attribute values.
///
/// Numbers compare numerically, strings lexically, booleans false < true and
/// `null` equals `null`. Values of different kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}
