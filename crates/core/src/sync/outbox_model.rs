//! Outbox item model and the durable store contract the engine drains.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::candidates::{AttendanceMethod, VerificationOutcome};
use crate::captures::CaptureModality;
use crate::errors::Result;

/// Record kind carried by an outbox item; selects the remote client method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncItemKind {
    Attendance,
    Biometric,
    Verification,
}

/// Outbox item lifecycle.
///
/// `InFlight` is in-memory only: a crash mid-request leaves the row
/// `Pending` for the next cycle (at-least-once delivery). Synced items are
/// deleted, not retained as a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncItemState {
    Pending,
    InFlight,
    Abandoned,
}

/// A durably persisted sync item awaiting remote delivery.
///
/// The id is a UUIDv7 assigned at enqueue time; it is stable for the item's
/// lifetime and doubles as the idempotency key for remote submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSyncItem {
    pub id: String,
    pub kind: SyncItemKind,
    pub payload: String,
    pub created_at: String,
    pub retry_count: i32,
    pub next_retry_at: Option<String>,
    pub state: SyncItemState,
    pub last_error: Option<String>,
    pub last_error_class: Option<String>,
    pub abandoned_at: Option<String>,
}

/// Attendance record as submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePayload {
    pub candidate_id: String,
    pub centre_id: String,
    pub method: AttendanceMethod,
    pub marked_at: String,
}

/// Biometric capture reference as submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricPayload {
    pub capture_id: String,
    pub candidate_id: String,
    pub modality: CaptureModality,
    pub content_ref: String,
    pub content_sha256: String,
    pub captured_at: String,
}

/// Verification outcome as submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    pub candidate_id: String,
    pub outcome: VerificationOutcome,
    pub score: Option<f64>,
    pub provider_ref: Option<String>,
    pub verified_at: String,
}

/// Persisted engine bookkeeping (singleton row in the store).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEngineState {
    pub last_sync_at: Option<String>,
    pub last_error: Option<String>,
    pub last_cycle_status: Option<String>,
    pub last_cycle_duration_ms: Option<i64>,
    pub consecutive_failures: i32,
}

/// Durable outbox contract implemented by the SQLite store.
///
/// All operations are safe under concurrent access from UI-triggered
/// enqueues and the draining cycle; atomicity lives in the store, not in
/// caller-side locks.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Oldest-first pending items whose backoff deadline has passed.
    /// Abandoned items are excluded. Restartable: no cursor state.
    fn list_pending(&self, limit: i64) -> Result<Vec<PendingSyncItem>>;

    /// Delete a delivered item. Idempotent: deleting an absent id is Ok.
    async fn mark_synced(&self, item_id: String) -> Result<()>;

    /// Atomically bump the retry count, stamping the next eligible attempt
    /// time and the failure diagnostics. Returns the new count.
    async fn increment_retry(
        &self,
        item_id: String,
        next_retry_at: String,
        error: String,
        error_class: String,
    ) -> Result<i32>;

    /// Quarantine an item that exhausted its budget or was rejected
    /// permanently. The row stays visible through [`OutboxStore::list_abandoned`].
    async fn mark_abandoned(&self, item_id: String, error: String, error_class: String)
        -> Result<()>;

    /// Operator-driven second chance for an abandoned item: resets the retry
    /// budget and returns the item to `Pending`.
    async fn requeue_abandoned(&self, item_id: String) -> Result<()>;

    fn pending_count(&self) -> Result<i64>;

    fn abandoned_count(&self) -> Result<i64>;

    fn list_abandoned(&self, limit: i64) -> Result<Vec<PendingSyncItem>>;

    async fn record_cycle_outcome(
        &self,
        status: String,
        duration_ms: i64,
        error: Option<String>,
    ) -> Result<()>;

    fn get_engine_state(&self) -> Result<SyncEngineState>;
}
