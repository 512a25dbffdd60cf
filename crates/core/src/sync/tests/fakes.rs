//! In-memory collaborators used by engine and scheduler tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::activity::{ActivityLogEntry, ActivityLogRepositoryTrait, NewActivityLogEntry};
use crate::errors::{DatabaseError, Error, Result};
use crate::sync::{
    AttendancePayload, BiometricPayload, CycleSummary, OutboxStore, PendingSyncItem, RemoteError,
    RemoteResult, RemoteSyncClient, SyncEngineState, SyncEventSink, SyncItemKind, SyncItemState,
    VerificationPayload,
};

fn storage_error(message: &str) -> Error {
    Error::Database(DatabaseError::Internal(message.to_string()))
}

#[derive(Default)]
pub struct MemoryOutbox {
    items: Mutex<Vec<PendingSyncItem>>,
    state: Mutex<SyncEngineState>,
    fail_mark_synced: AtomicBool,
}

impl MemoryOutbox {
    pub fn enqueue<T: Serialize>(&self, kind: SyncItemKind, payload: &T) -> String {
        self.enqueue_raw(kind, serde_json::to_string(payload).expect("serialize payload"))
    }

    pub fn enqueue_raw(&self, kind: SyncItemKind, payload: String) -> String {
        let id = Uuid::now_v7().to_string();
        self.items.lock().unwrap().push(PendingSyncItem {
            id: id.clone(),
            kind,
            payload,
            created_at: Utc::now().to_rfc3339(),
            retry_count: 0,
            next_retry_at: None,
            state: SyncItemState::Pending,
            last_error: None,
            last_error_class: None,
            abandoned_at: None,
        });
        id
    }

    pub fn fail_mark_synced(&self, fail: bool) {
        self.fail_mark_synced.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, item_id: &str) -> Option<PendingSyncItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
    }
}

fn is_eligible(item: &PendingSyncItem, now: DateTime<Utc>) -> bool {
    if item.state != SyncItemState::Pending {
        return false;
    }
    match item.next_retry_at.as_deref() {
        None => true,
        Some(at) => DateTime::parse_from_rfc3339(at)
            .map(|at| at.with_timezone(&Utc) <= now)
            .unwrap_or(true),
    }
}

#[async_trait]
impl OutboxStore for MemoryOutbox {
    fn list_pending(&self, limit: i64) -> Result<Vec<PendingSyncItem>> {
        let now = Utc::now();
        let mut pending: Vec<_> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| is_eligible(item, now))
            .cloned()
            .collect();
        pending.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_synced(&self, item_id: String) -> Result<()> {
        if self.fail_mark_synced.load(Ordering::SeqCst) {
            return Err(storage_error("disk full"));
        }
        self.items.lock().unwrap().retain(|item| item.id != item_id);
        Ok(())
    }

    async fn increment_retry(
        &self,
        item_id: String,
        next_retry_at: String,
        error: String,
        error_class: String,
    ) -> Result<i32> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| storage_error("item not found"))?;
        item.retry_count += 1;
        item.next_retry_at = Some(next_retry_at);
        item.last_error = Some(error);
        item.last_error_class = Some(error_class);
        Ok(item.retry_count)
    }

    async fn mark_abandoned(
        &self,
        item_id: String,
        error: String,
        error_class: String,
    ) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| storage_error("item not found"))?;
        item.state = SyncItemState::Abandoned;
        item.abandoned_at = Some(Utc::now().to_rfc3339());
        item.last_error = Some(error);
        item.last_error_class = Some(error_class);
        Ok(())
    }

    async fn requeue_abandoned(&self, item_id: String) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id && item.state == SyncItemState::Abandoned)
            .ok_or_else(|| storage_error("abandoned item not found"))?;
        item.state = SyncItemState::Pending;
        item.retry_count = 0;
        item.next_retry_at = None;
        item.last_error = None;
        item.last_error_class = None;
        item.abandoned_at = None;
        Ok(())
    }

    fn pending_count(&self) -> Result<i64> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.state == SyncItemState::Pending)
            .count() as i64)
    }

    fn abandoned_count(&self) -> Result<i64> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.state == SyncItemState::Abandoned)
            .count() as i64)
    }

    fn list_abandoned(&self, limit: i64) -> Result<Vec<PendingSyncItem>> {
        let mut abandoned: Vec<_> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.state == SyncItemState::Abandoned)
            .cloned()
            .collect();
        abandoned.truncate(limit as usize);
        Ok(abandoned)
    }

    async fn record_cycle_outcome(
        &self,
        status: String,
        duration_ms: i64,
        error: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if status == "ok" {
            state.last_sync_at = Some(Utc::now().to_rfc3339());
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
        }
        state.last_cycle_status = Some(status);
        state.last_cycle_duration_ms = Some(duration_ms);
        state.last_error = error;
        Ok(())
    }

    fn get_engine_state(&self) -> Result<SyncEngineState> {
        Ok(self.state.lock().unwrap().clone())
    }
}

/// Remote client whose failures are scripted per kind; successes by default.
#[derive(Default)]
pub struct ScriptedRemoteClient {
    pub calls: Mutex<Vec<(SyncItemKind, String)>>,
    failures: Mutex<HashMap<SyncItemKind, RemoteError>>,
}

impl ScriptedRemoteClient {
    pub fn fail_kind(&self, kind: SyncItemKind, error: RemoteError) {
        self.failures.lock().unwrap().insert(kind, error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, kind: SyncItemKind, idempotency_key: &str) -> RemoteResult {
        self.calls
            .lock()
            .unwrap()
            .push((kind, idempotency_key.to_string()));
        match self.failures.lock().unwrap().get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteSyncClient for ScriptedRemoteClient {
    async fn submit_attendance(
        &self,
        idempotency_key: &str,
        _payload: &AttendancePayload,
    ) -> RemoteResult {
        self.record(SyncItemKind::Attendance, idempotency_key)
    }

    async fn submit_biometric(
        &self,
        idempotency_key: &str,
        _payload: &BiometricPayload,
    ) -> RemoteResult {
        self.record(SyncItemKind::Biometric, idempotency_key)
    }

    async fn submit_verification(
        &self,
        idempotency_key: &str,
        _payload: &VerificationPayload,
    ) -> RemoteResult {
        self.record(SyncItemKind::Verification, idempotency_key)
    }
}

/// Remote client that parks mid-request until released; lets tests observe a
/// cycle while it is in flight.
pub struct GatedRemoteClient {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedRemoteClient {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    async fn park(&self) -> RemoteResult {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[async_trait]
impl RemoteSyncClient for GatedRemoteClient {
    async fn submit_attendance(&self, _key: &str, _payload: &AttendancePayload) -> RemoteResult {
        self.park().await
    }

    async fn submit_biometric(&self, _key: &str, _payload: &BiometricPayload) -> RemoteResult {
        self.park().await
    }

    async fn submit_verification(
        &self,
        _key: &str,
        _payload: &VerificationPayload,
    ) -> RemoteResult {
        self.park().await
    }
}

#[derive(Default)]
pub struct MemoryActivityLog {
    pub entries: Mutex<Vec<ActivityLogEntry>>,
    fail_append: AtomicBool,
}

impl MemoryActivityLog {
    pub fn fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.action.clone())
            .collect()
    }
}

#[async_trait]
impl ActivityLogRepositoryTrait for MemoryActivityLog {
    async fn append(&self, entry: NewActivityLogEntry) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(storage_error("audit write failed"));
        }
        let mut entries = self.entries.lock().unwrap();
        let id = entries.len() as i64 + 1;
        entries.push(ActivityLogEntry {
            id,
            action: entry.action,
            details: entry.details,
            actor_id: entry.actor_id,
            timestamp: Utc::now().to_rfc3339(),
        });
        Ok(())
    }

    fn list_recent(&self, limit: i64) -> Result<Vec<ActivityLogEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn purge_older_than(&self, _retention_days: i64) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub completed: Mutex<Vec<CycleSummary>>,
    pub abandoned: Mutex<Vec<(String, SyncItemKind, String)>>,
}

impl SyncEventSink for RecordingSink {
    fn cycle_completed(&self, summary: &CycleSummary) {
        self.completed.lock().unwrap().push(*summary);
    }

    fn item_abandoned(&self, item_id: &str, kind: SyncItemKind, reason: &str) {
        self.abandoned
            .lock()
            .unwrap()
            .push((item_id.to_string(), kind, reason.to_string()));
    }
}

pub fn attendance_payload(candidate_id: &str) -> AttendancePayload {
    AttendancePayload {
        candidate_id: candidate_id.to_string(),
        centre_id: "centre-007".to_string(),
        method: crate::candidates::AttendanceMethod::FaceMatch,
        marked_at: Utc::now().to_rfc3339(),
    }
}

pub fn verification_payload(candidate_id: &str) -> VerificationPayload {
    VerificationPayload {
        candidate_id: candidate_id.to_string(),
        outcome: crate::candidates::VerificationOutcome::Matched,
        score: Some(0.98),
        provider_ref: Some("rek-42".to_string()),
        verified_at: Utc::now().to_rfc3339(),
    }
}
