//! The record cache contract.

use crate::patch::OperationProcessor;
use crate::query::evaluate;
use orrery_core::{
    CacheSettings, OrreryResult, Query, QueryExpression, QueryResult, Record, RecordChangeset,
    RecordIdentity, RecordOperation, RecordRelationship, RecordSelection, RequestOptions, Schema,
};
use std::sync::Arc;

/// Synchronous record cache.
///
/// Implementors supply the storage primitives (records and inverse edges).
/// `patch`, `patch_atomic` and `query` are provided on top of them, so any
/// implementor that routes every mutation through the primitives gets the
/// relationship bookkeeping and change tracking for free.
///
/// # Primitives
///
/// The primitives never validate and never touch the inverse index on their
/// own: `set_record` stores a record as given, `remove_record` only drops it
/// from the record store. Index maintenance is the job of `patch`.
pub trait SyncRecordCache {
    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    fn schema(&self) -> &Arc<Schema>;

    fn settings(&self) -> &CacheSettings;

    // ========================================================================
    // RECORDS
    // ========================================================================

    fn get_record(&self, identity: &RecordIdentity) -> Option<&Record>;

    /// Every record of a type, or the present subset of an identity list
    /// (missing identities are skipped).
    fn get_records(&self, selection: &RecordSelection) -> Vec<Record>;

    /// Upsert, replacing any record with the same identity wholesale.
    fn set_record(&mut self, record: Record);

    fn set_records(&mut self, records: Vec<Record>) {
        for record in records {
            self.set_record(record);
        }
    }

    fn remove_record(&mut self, identity: &RecordIdentity) -> Option<Record>;

    fn remove_records(&mut self, identities: &[RecordIdentity]) -> Vec<Record> {
        identities
            .iter()
            .filter_map(|identity| self.remove_record(identity))
            .collect()
    }

    // ========================================================================
    // INVERSE RELATIONSHIPS
    // ========================================================================

    /// Edges pointing at `identity`.
    fn get_inverse_relationships(&self, identity: &RecordIdentity) -> Vec<RecordRelationship>;

    /// Edges pointing at each identity, concatenated in input order.
    fn get_inverse_relationships_of(&self, identities: &[RecordIdentity]) -> Vec<RecordRelationship> {
        identities
            .iter()
            .flat_map(|identity| self.get_inverse_relationships(identity))
            .collect()
    }

    fn add_inverse_relationships(&mut self, edges: &[RecordRelationship]);

    fn remove_inverse_relationships(&mut self, edges: &[RecordRelationship]);

    // ========================================================================
    // PROVIDED
    // ========================================================================

    /// Apply a captured diff as-is: set records, remove records, add edges,
    /// remove edges, in that order.
    fn apply_record_changeset(&mut self, changeset: &RecordChangeset) {
        self.set_records(changeset.set_records().to_vec());
        self.remove_records(changeset.remove_records());
        self.add_inverse_relationships(changeset.add_inverse_relationships());
        self.remove_inverse_relationships(changeset.remove_inverse_relationships());
    }

    /// Apply operations in order and return their inverses in application
    /// order. Replaying the inverses in reverse undoes the batch.
    ///
    /// Each operation is validated before it mutates anything. On failure the
    /// failing operation leaves no trace but earlier ones stay applied; use
    /// [`SyncRecordCache::patch_atomic`] for all-or-nothing batches.
    fn patch(&mut self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>> {
        let mut inverse = Vec::new();
        for operation in operations {
            inverse.extend(OperationProcessor::new(self).apply(operation)?);
        }
        Ok(inverse)
    }

    /// Like [`SyncRecordCache::patch`], but a failing operation rolls every
    /// earlier operation of the batch back before the error is returned.
    fn patch_atomic(&mut self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>> {
        let mut inverse = Vec::new();
        for operation in operations {
            match OperationProcessor::new(self).apply(operation) {
                Ok(ops) => inverse.extend(ops),
                Err(e) => {
                    tracing::debug!(
                        operation = operation.kind(),
                        record = %operation.record(),
                        error = %e,
                        "Rolling back partially applied batch"
                    );
                    for undo in inverse.iter().rev() {
                        if let Err(rollback) = OperationProcessor::new(self).apply(undo) {
                            tracing::warn!(
                                operation = undo.kind(),
                                record = %undo.record(),
                                error = %rollback,
                                "Rollback operation failed"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(inverse)
    }

    /// Evaluate one expression with the cache's default options.
    fn query_expression(&self, expression: &QueryExpression) -> OrreryResult<QueryResult> {
        evaluate(self, expression, &RequestOptions::default())
    }

    /// Evaluate every expression of a query, one result per expression.
    fn query(&self, query: &Query) -> OrreryResult<Vec<QueryResult>> {
        query.validate()?;
        query
            .expressions
            .iter()
            .map(|expression| evaluate(self, expression, &query.options))
            .collect()
    }
}
