//! Orrery Cache - Record Cache with Inverse Relationship Index
//!
//! The cache owns a record store and an inverse relationship index and keeps
//! them consistent under a stream of [`RecordOperation`]s:
//!
//! - [`SyncRecordCache`]: storage primitives plus provided `patch`,
//!   `patch_atomic` and `query`. `patch` returns the operations that undo it.
//! - [`MemoryCache`]: the in-memory implementation.
//! - [`TransformBuffer`]: a tracking overlay that yields a
//!   [`RecordChangeset`](orrery_core::RecordChangeset) for a session.
//! - [`AsyncRecordCache`] / [`SharedRecordCache`]: the async variant.
//!
//! Two-way relationships are kept symmetric whenever the schema declares an
//! inverse that the related type materializes. What removing a record does to
//! edges pointing at it is governed by
//! [`InboundEdgePolicy`](orrery_core::InboundEdgePolicy).
//!
//! [`RecordOperation`]: orrery_core::RecordOperation

pub mod async_cache;
pub mod buffer;
pub mod inverse_index;
pub mod memory;
pub mod patch;
pub mod query;
mod traits;

pub use async_cache::{AsyncRecordCache, SharedRecordCache};
pub use buffer::TransformBuffer;
pub use inverse_index::InverseRelationshipIndex;
pub use memory::MemoryCache;
pub use patch::validate_operation;
pub use query::{evaluate, refine};
pub use traits::SyncRecordCache;
