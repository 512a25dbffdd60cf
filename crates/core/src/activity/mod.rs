//! Append-only activity log contract.
//!
//! Every state transition of interest produces an entry. Appends are
//! fire-and-forget at call sites: a failed audit write is logged and never
//! blocks or fails the operation that produced it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub actor_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityLogEntry {
    pub action: String,
    pub details: String,
    pub actor_id: String,
}

impl NewActivityLogEntry {
    pub fn new(
        action: impl Into<String>,
        details: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            details: details.into(),
            actor_id: actor_id.into(),
        }
    }
}

#[async_trait]
pub trait ActivityLogRepositoryTrait: Send + Sync {
    async fn append(&self, entry: NewActivityLogEntry) -> Result<()>;

    fn list_recent(&self, limit: i64) -> Result<Vec<ActivityLogEntry>>;

    /// Drops entries older than the retention window; returns the number of
    /// purged rows. Invoked by the retention enforcement collaborator, not by
    /// the sync engine.
    async fn purge_older_than(&self, retention_days: i64) -> Result<usize>;
}
