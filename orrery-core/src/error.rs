//! Error types for orrery operations

use crate::identity::RecordIdentity;
use crate::schema::{AttributeKind, RelationshipKind};
use thiserror::Error;

/// Malformed operations, queries, envelopes and schema mismatches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown record type: {record_type}")]
    UnknownType { record_type: String },

    #[error("Record of type {record_type} has an empty id")]
    MissingId { record_type: String },

    #[error("Unknown attribute {attribute} on {record_type}")]
    UnknownAttribute {
        record_type: String,
        attribute: String,
    },

    #[error("Attribute {record_type}.{attribute} expects a {expected:?} value")]
    AttributeKindMismatch {
        record_type: String,
        attribute: String,
        expected: AttributeKind,
    },

    #[error("Unknown key {key} on {record_type}")]
    UnknownKey { record_type: String, key: String },

    #[error("Unknown relationship {relationship} on {record_type}")]
    UnknownRelationship {
        record_type: String,
        relationship: String,
    },

    #[error("Relationship {record_type}.{relationship} is declared {declared:?}")]
    CardinalityMismatch {
        record_type: String,
        relationship: String,
        declared: RelationshipKind,
    },

    #[error("Relationship {record_type}.{relationship} cannot point at {related_type}")]
    DisallowedRelatedType {
        record_type: String,
        relationship: String,
        related_type: String,
    },

    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },
}

/// Transform buffer session errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("A change tracking session is already open")]
    AlreadyTracking,

    #[error("No change tracking session is open")]
    NotTracking,
}

/// Transform log errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("Transform {id} is both present in the log and marked rejected")]
    Inconsistent { id: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all orrery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrreryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Record not found: {identity}")]
    RecordNotFound { identity: RecordIdentity },

    #[error("Observer of {event} rejected the request: {reason}")]
    ObserverRejection { event: String, reason: String },

    #[error("Handler error in source {source_name}: {reason}")]
    Handler { source_name: String, reason: String },

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl OrreryError {
    pub fn not_found(identity: RecordIdentity) -> Self {
        OrreryError::RecordNotFound { identity }
    }

    pub fn observer_rejection(event: impl Into<String>, reason: impl Into<String>) -> Self {
        OrreryError::ObserverRejection {
            event: event.into(),
            reason: reason.into(),
        }
    }

    pub fn handler(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        OrreryError::Handler {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for orrery operations.
pub type OrreryResult<T> = Result<T, OrreryError>;

// =============================================================================
// TESTS
// =============================================================================
