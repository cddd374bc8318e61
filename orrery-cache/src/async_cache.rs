//! Async record cache.
//!
//! [`AsyncRecordCache`] mirrors [`SyncRecordCache`] with every operation
//! returning a future. [`SharedRecordCache`] provides it for any sync cache
//! behind a tokio `RwLock`, so sources and their handlers can share one cache
//! across await points.

use crate::traits::SyncRecordCache;
use async_trait::async_trait;
use orrery_core::{
    OrreryResult, Query, QueryResult, Record, RecordChangeset, RecordIdentity, RecordOperation,
    RecordRelationship, RecordSelection,
};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Async record cache contract.
///
/// Same logical behavior as [`SyncRecordCache`]; records are returned by
/// value since no borrow can outlive the call.
#[async_trait]
pub trait AsyncRecordCache: Send + Sync {
    async fn get_record(&self, identity: &RecordIdentity) -> Option<Record>;

    async fn get_records(&self, selection: &RecordSelection) -> Vec<Record>;

    async fn set_record(&self, record: Record);

    async fn set_records(&self, records: Vec<Record>);

    async fn remove_record(&self, identity: &RecordIdentity) -> Option<Record>;

    async fn remove_records(&self, identities: &[RecordIdentity]) -> Vec<Record>;

    async fn get_inverse_relationships(&self, identities: &[RecordIdentity]) -> Vec<RecordRelationship>;

    async fn add_inverse_relationships(&self, edges: &[RecordRelationship]);

    async fn remove_inverse_relationships(&self, edges: &[RecordRelationship]);

    async fn apply_record_changeset(&self, changeset: &RecordChangeset);

    async fn patch(&self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>>;

    async fn patch_atomic(&self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>>;

    async fn query(&self, query: &Query) -> OrreryResult<Vec<QueryResult>>;
}

/// A sync cache shared behind a tokio `RwLock`.
#[derive(Debug)]
pub struct SharedRecordCache<C> {
    inner: Arc<RwLock<C>>,
}

impl<C> Clone for SharedRecordCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> SharedRecordCache<C> {
    pub fn new(cache: C) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }

    /// Shared access for multi-step reads.
    pub async fn read(&self) -> RwLockReadGuard<'_, C> {
        self.inner.read().await
    }

    /// Exclusive access for multi-step writes.
    pub async fn write(&self) -> RwLockWriteGuard<'_, C> {
        self.inner.write().await
    }
}

#[async_trait]
impl<C> AsyncRecordCache for SharedRecordCache<C>
where
    C: SyncRecordCache + Send + Sync,
{
    async fn get_record(&self, identity: &RecordIdentity) -> Option<Record> {
        self.inner.read().await.get_record(identity).cloned()
    }

    async fn get_records(&self, selection: &RecordSelection) -> Vec<Record> {
        self.inner.read().await.get_records(selection)
    }

    async fn set_record(&self, record: Record) {
        self.inner.write().await.set_record(record);
    }

    async fn set_records(&self, records: Vec<Record>) {
        self.inner.write().await.set_records(records);
    }

    async fn remove_record(&self, identity: &RecordIdentity) -> Option<Record> {
        self.inner.write().await.remove_record(identity)
    }

    async fn remove_records(&self, identities: &[RecordIdentity]) -> Vec<Record> {
        self.inner.write().await.remove_records(identities)
    }

    async fn get_inverse_relationships(&self, identities: &[RecordIdentity]) -> Vec<RecordRelationship> {
        self.inner.read().await.get_inverse_relationships_of(identities)
    }

    async fn add_inverse_relationships(&self, edges: &[RecordRelationship]) {
        self.inner.write().await.add_inverse_relationships(edges);
    }

    async fn remove_inverse_relationships(&self, edges: &[RecordRelationship]) {
        self.inner.write().await.remove_inverse_relationships(edges);
    }

    async fn apply_record_changeset(&self, changeset: &RecordChangeset) {
        self.inner.write().await.apply_record_changeset(changeset);
    }

    async fn patch(&self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>> {
        self.inner.write().await.patch(operations)
    }

    async fn patch_atomic(&self, operations: &[RecordOperation]) -> OrreryResult<Vec<RecordOperation>> {
        self.inner.write().await.patch_atomic(operations)
    }

    async fn query(&self, query: &Query) -> OrreryResult<Vec<QueryResult>> {
        self.inner.read().await.query(query)
    }
}
