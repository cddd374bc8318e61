//! Transform log.
//!
//! Append-only record of the transform ids a source has applied. The
//! lifecycle reads it before every mutating request (dedupe) and appends
//! after every successful one. Ids of failed requests are marked rejected
//! until a retry with the same id succeeds.

use chrono::{DateTime, Utc};
use orrery_core::{LogError, OrreryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::RwLock;

/// One applied transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub appended_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<LogEntry>,
    ids: HashSet<String>,
    rejected: HashSet<String>,
}

/// In-memory transform log.
#[derive(Debug, Default)]
pub struct TransformLog {
    state: RwLock<LogState>,
}

impl TransformLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.ids.contains(id)
    }

    /// Whether `id` was already applied, failing when the log holds it as
    /// both applied and rejected.
    pub async fn check(&self, id: &str) -> OrreryResult<bool> {
        let state = self.state.read().await;
        let present = state.ids.contains(id);
        if present && state.rejected.contains(id) {
            return Err(LogError::Inconsistent { id: id.to_string() }.into());
        }
        Ok(present)
    }

    /// Append `id`, clearing any earlier rejection of it. Returns `false`
    /// when the id was already logged.
    pub async fn append(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.rejected.remove(id);
        if !state.ids.insert(id.to_string()) {
            return false;
        }
        state.entries.push(LogEntry {
            id: id.to_string(),
            appended_at: Utc::now(),
        });
        true
    }

    /// Entries in append order.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.state.read().await.entries.clone()
    }

    pub async fn head(&self) -> Option<String> {
        self.state.read().await.entries.last().map(|entry| entry.id.clone())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn mark_rejected(&self, id: &str) {
        self.state.write().await.rejected.insert(id.to_string());
    }

    /// Clear a rejection mark. Returns whether one was set.
    pub async fn accept(&self, id: &str) -> bool {
        self.state.write().await.rejected.remove(id)
    }

    pub async fn is_rejected(&self, id: &str) -> bool {
        self.state.read().await.rejected.contains(id)
    }

    /// Drop every entry and rejection mark.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = LogState::default();
    }
}
