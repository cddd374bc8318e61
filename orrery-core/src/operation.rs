//! The closed set of record mutations.

use crate::identity::RecordIdentity;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One atomic mutation against a record.
///
/// Operations are the only unit of mutation; a transform is an ordered,
/// identified batch of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum RecordOperation {
    /// Insert a record, overwriting any existing record with the same identity.
    AddRecord { record: Record },
    /// Merge attributes, keys and the listed relationships into a record,
    /// creating it when missing.
    UpdateRecord { record: Record },
    RemoveRecord { record: RecordIdentity },
    /// A `null` value unsets the attribute.
    ReplaceAttribute {
        record: RecordIdentity,
        attribute: String,
        value: Value,
    },
    /// `None` unsets the key.
    ReplaceKey {
        record: RecordIdentity,
        key: String,
        value: Option<String>,
    },
    ReplaceRelatedRecord {
        record: RecordIdentity,
        relationship: String,
        #[serde(rename = "relatedRecord")]
        related_record: Option<RecordIdentity>,
    },
    ReplaceRelatedRecords {
        record: RecordIdentity,
        relationship: String,
        #[serde(rename = "relatedRecords")]
        related_records: Vec<RecordIdentity>,
    },
    AddToRelatedRecords {
        record: RecordIdentity,
        relationship: String,
        #[serde(rename = "relatedRecord")]
        related_record: RecordIdentity,
    },
    RemoveFromRelatedRecords {
        record: RecordIdentity,
        relationship: String,
        #[serde(rename = "relatedRecord")]
        related_record: RecordIdentity,
    },
}

impl RecordOperation {
    /// Identity of the record this operation targets.
    pub fn record(&self) -> &RecordIdentity {
        match self {
            RecordOperation::AddRecord { record } | RecordOperation::UpdateRecord { record } => {
                &record.identity
            }
            RecordOperation::RemoveRecord { record }
            | RecordOperation::ReplaceAttribute { record, .. }
            | RecordOperation::ReplaceKey { record, .. }
            | RecordOperation::ReplaceRelatedRecord { record, .. }
            | RecordOperation::ReplaceRelatedRecords { record, .. }
            | RecordOperation::AddToRelatedRecords { record, .. }
            | RecordOperation::RemoveFromRelatedRecords { record, .. } => record,
        }
    }

    /// Wire name of the operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordOperation::AddRecord { .. } => "addRecord",
            RecordOperation::UpdateRecord { .. } => "updateRecord",
            RecordOperation::RemoveRecord { .. } => "removeRecord",
            RecordOperation::ReplaceAttribute { .. } => "replaceAttribute",
            RecordOperation::ReplaceKey { .. } => "replaceKey",
            RecordOperation::ReplaceRelatedRecord { .. } => "replaceRelatedRecord",
            RecordOperation::ReplaceRelatedRecords { .. } => "replaceRelatedRecords",
            RecordOperation::AddToRelatedRecords { .. } => "addToRelatedRecords",
            RecordOperation::RemoveFromRelatedRecords { .. } => "removeFromRelatedRecords",
        }
    }

    /// The relationship name for relationship-affecting operations.
    pub fn relationship(&self) -> Option<&str> {
        match self {
            RecordOperation::ReplaceRelatedRecord { relationship, .. }
            | RecordOperation::ReplaceRelatedRecords { relationship, .. }
            | RecordOperation::AddToRelatedRecords { relationship, .. }
            | RecordOperation::RemoveFromRelatedRecords { relationship, .. } => Some(relationship),
            _ => None,
        }
    }
}
