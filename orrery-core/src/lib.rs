//! Orrery Core - Record Graph Types
//!
//! Pure data structures shared by every orrery crate: record identity, the
//! closed set of record operations, the schema consulted for validation and
//! two-way relationship symmetry, query expressions, request envelopes,
//! changesets, configuration and the error taxonomy.
//!
//! This crate carries no cache or source behavior.

pub mod changeset;
pub mod config;
pub mod error;
pub mod identity;
pub mod operation;
pub mod query;
pub mod record;
pub mod schema;
pub mod transform;

pub use changeset::{CacheSnapshot, RecordChangeset};
pub use config::{CacheSettings, InboundEdgePolicy, SourceSettings, UpdateStrategy};
pub use error::{ConfigError, LogError, OrreryError, OrreryResult, TrackingError, ValidationError};
pub use identity::{new_request_id, RecordIdentity, RecordRelationship};
pub use operation::RecordOperation;
pub use query::{
    compare_values, ComparisonOperator, FilterSpecifier, PageSpecifier, QueryExpression,
    QueryResult, RecordSelection, SetComparisonOperator, SortOrder, SortSpecifier,
};
pub use record::{Record, RelationshipData};
pub use schema::{
    AttributeDefinition, AttributeKind, ModelDefinition, RelationshipDefinition,
    RelationshipKind, Schema,
};
pub use transform::{Query, QueryBuilder, RequestOptions, Transform, TransformBuilder};
