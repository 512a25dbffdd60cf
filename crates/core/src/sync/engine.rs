//! The outbox processor: drains pending items, applies retry policy and
//! reports status.

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::activity::{ActivityLogRepositoryTrait, NewActivityLogEntry};
use crate::errors::Result;

use super::{
    AttendancePayload, BiometricPayload, OutboxStore, PendingSyncItem, ReachabilityMonitor,
    RemoteError, RemoteSyncClient, RetryClass, SyncItemKind, SyncItemState, VerificationPayload,
};

/// Actor id stamped on audit entries produced by the engine itself.
pub const SYNC_ENGINE_ACTOR: &str = "sync-engine";

/// Engine-wide retry and batching configuration.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub max_retries: i32,
    pub base_delay_secs: i64,
    pub max_delay_secs: i64,
    pub batch_limit: i64,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 5,
            max_delay_secs: 300,
            batch_limit: 50,
        }
    }
}

/// Exponential backoff in seconds with cap: `min(max_delay, base * 2^r)`.
pub fn backoff_seconds(config: &SyncEngineConfig, retry_count: i32) -> i64 {
    const MAX_EXPONENT: i32 = 16;

    let exponent = retry_count.clamp(0, MAX_EXPONENT) as u32;
    config
        .base_delay_secs
        .saturating_mul(2_i64.saturating_pow(exponent))
        .min(config.max_delay_secs)
}

/// Per-item tallies for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub synced: usize,
    pub retried: usize,
    pub abandoned: usize,
    pub duration_ms: i64,
}

/// Result of invoking [`SyncEngine::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion (possibly over an empty outbox).
    Completed(CycleSummary),
    /// Another cycle holds the single-flight lock; no work was done.
    AlreadyRunning,
    /// The device is offline; the outbox was not touched.
    Offline,
}

/// Read-only snapshot for the operator surface. Never blocks on a cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub is_online: bool,
    pub pending_count: i64,
    pub abandoned_count: i64,
    pub last_sync_time: Option<String>,
    pub last_cycle_status: Option<String>,
    pub cycle_in_progress: bool,
}

/// Status-change notifications delivered to the UI layer.
pub trait SyncEventSink: Send + Sync {
    fn cycle_completed(&self, _summary: &CycleSummary) {}

    /// Abandoned items represent unsynced operator work and must surface
    /// distinctly; implementations raise an operator-visible alert.
    fn item_abandoned(&self, _item_id: &str, _kind: SyncItemKind, _reason: &str) {}
}

/// Sink that drops all notifications.
pub struct NullEventSink;

impl SyncEventSink for NullEventSink {}

enum ItemResolution {
    Synced,
    Retried,
    Abandoned,
}

/// Single-flight outbox processor.
///
/// All collaborators are injected; tests substitute in-memory fakes.
pub struct SyncEngine {
    outbox: Arc<dyn OutboxStore>,
    remote: Arc<dyn RemoteSyncClient>,
    reachability: Arc<dyn ReachabilityMonitor>,
    activity_log: Arc<dyn ActivityLogRepositoryTrait>,
    sink: Arc<dyn SyncEventSink>,
    config: SyncEngineConfig,
    cycle_lock: Mutex<()>,
    cycle_in_progress: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        remote: Arc<dyn RemoteSyncClient>,
        reachability: Arc<dyn ReachabilityMonitor>,
        activity_log: Arc<dyn ActivityLogRepositoryTrait>,
        sink: Arc<dyn SyncEventSink>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            outbox,
            remote,
            reachability,
            activity_log,
            sink,
            config,
            cycle_lock: Mutex::new(()),
            cycle_in_progress: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Runs one sync cycle. Safe to invoke from any trigger at any time:
    /// a concurrent invocation returns [`CycleOutcome::AlreadyRunning`]
    /// immediately instead of queueing behind the running cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("[SyncEngine] Cycle already in progress; skipping trigger");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        self.cycle_in_progress.store(true, Ordering::SeqCst);
        let outcome = self.run_cycle_locked().await;
        self.cycle_in_progress.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_cycle_locked(&self) -> Result<CycleOutcome> {
        if !self.reachability.is_online() {
            debug!("[SyncEngine] Offline; outbox untouched");
            return Ok(CycleOutcome::Offline);
        }

        let started_at = std::time::Instant::now();
        let items = self.outbox.list_pending(self.config.batch_limit)?;
        debug!("[SyncEngine] Cycle started with {} pending items", items.len());

        let mut summary = CycleSummary::default();
        for mut item in items {
            item.state = SyncItemState::InFlight;
            match self.process_item(&item).await {
                Ok(ItemResolution::Synced) => summary.synced += 1,
                Ok(ItemResolution::Retried) => summary.retried += 1,
                Ok(ItemResolution::Abandoned) => summary.abandoned += 1,
                Err(err) => {
                    // Storage failure: stop early, leave remaining items
                    // untouched, and never charge their retry budgets.
                    warn!("[SyncEngine] Cycle aborted by storage error: {}", err);
                    let _ = self
                        .outbox
                        .record_cycle_outcome(
                            "storage_error".to_string(),
                            started_at.elapsed().as_millis() as i64,
                            Some(err.to_string()),
                        )
                        .await;
                    return Err(err);
                }
            }
        }

        summary.duration_ms = started_at.elapsed().as_millis() as i64;
        self.outbox
            .record_cycle_outcome("ok".to_string(), summary.duration_ms, None)
            .await?;

        info!(
            "[SyncEngine] Cycle complete synced={} retried={} abandoned={} duration_ms={}",
            summary.synced, summary.retried, summary.abandoned, summary.duration_ms
        );
        self.sink.cycle_completed(&summary);
        Ok(CycleOutcome::Completed(summary))
    }

    async fn process_item(&self, item: &PendingSyncItem) -> Result<ItemResolution> {
        match self.dispatch(item).await {
            Ok(()) => {
                self.outbox.mark_synced(item.id.clone()).await?;
                self.audit(
                    "sync.item_synced",
                    format!("kind={} item_id={}", kind_name(item.kind), item.id),
                )
                .await;
                Ok(ItemResolution::Synced)
            }
            Err(remote_err) => self.resolve_failure(item, remote_err).await,
        }
    }

    async fn resolve_failure(
        &self,
        item: &PendingSyncItem,
        remote_err: RemoteError,
    ) -> Result<ItemResolution> {
        match remote_err.class {
            RetryClass::Permanent => {
                // Retrying a permanently rejected payload cannot succeed;
                // quarantine without consuming the retry budget.
                self.abandon_item(item, &remote_err).await?;
                Ok(ItemResolution::Abandoned)
            }
            RetryClass::Transient => {
                let delay = backoff_seconds(&self.config, item.retry_count);
                let next_retry_at = (Utc::now() + Duration::seconds(delay)).to_rfc3339();
                let new_count = self
                    .outbox
                    .increment_retry(
                        item.id.clone(),
                        next_retry_at,
                        remote_err.message.clone(),
                        remote_err.class.as_str().to_string(),
                    )
                    .await?;

                if new_count >= self.config.max_retries {
                    self.abandon_item(item, &remote_err).await?;
                    return Ok(ItemResolution::Abandoned);
                }

                debug!(
                    "[SyncEngine] Transient failure for item {} (retry {}/{}, next in {}s): {}",
                    item.id, new_count, self.config.max_retries, delay, remote_err.message
                );
                Ok(ItemResolution::Retried)
            }
        }
    }

    async fn abandon_item(&self, item: &PendingSyncItem, remote_err: &RemoteError) -> Result<()> {
        self.outbox
            .mark_abandoned(
                item.id.clone(),
                remote_err.message.clone(),
                remote_err.class.as_str().to_string(),
            )
            .await?;
        warn!(
            "[SyncEngine] Item {} abandoned ({}): {}",
            item.id,
            remote_err.class.as_str(),
            remote_err.message
        );
        self.audit(
            "sync.item_abandoned",
            format!(
                "kind={} item_id={} class={} error={}",
                kind_name(item.kind),
                item.id,
                remote_err.class.as_str(),
                remote_err.message
            ),
        )
        .await;
        self.sink
            .item_abandoned(&item.id, item.kind, &remote_err.message);
        Ok(())
    }

    /// Decode the payload for the item's kind and invoke the matching remote
    /// method. A payload that no longer decodes can never be delivered, so
    /// decode failures classify as permanent.
    async fn dispatch(&self, item: &PendingSyncItem) -> std::result::Result<(), RemoteError> {
        match item.kind {
            SyncItemKind::Attendance => {
                let payload: AttendancePayload = decode_payload(item)?;
                self.remote.submit_attendance(&item.id, &payload).await
            }
            SyncItemKind::Biometric => {
                let payload: BiometricPayload = decode_payload(item)?;
                self.remote.submit_biometric(&item.id, &payload).await
            }
            SyncItemKind::Verification => {
                let payload: VerificationPayload = decode_payload(item)?;
                self.remote.submit_verification(&item.id, &payload).await
            }
        }
    }

    /// Return an abandoned item to the pending queue after human review.
    pub async fn requeue_abandoned(&self, item_id: String) -> Result<()> {
        self.outbox.requeue_abandoned(item_id.clone()).await?;
        self.audit("sync.item_requeued", format!("item_id={}", item_id))
            .await;
        Ok(())
    }

    /// Read-only status snapshot; uses the store's read path and never takes
    /// the cycle lock.
    pub fn status(&self) -> Result<EngineStatus> {
        let state = self.outbox.get_engine_state()?;
        Ok(EngineStatus {
            is_online: self.reachability.is_online(),
            pending_count: self.outbox.pending_count()?,
            abandoned_count: self.outbox.abandoned_count()?,
            last_sync_time: state.last_sync_at,
            last_cycle_status: state.last_cycle_status,
            cycle_in_progress: self.cycle_in_progress.load(Ordering::SeqCst),
        })
    }

    async fn audit(&self, action: &str, details: String) {
        let entry = NewActivityLogEntry::new(action, details, SYNC_ENGINE_ACTOR);
        if let Err(err) = self.activity_log.append(entry).await {
            warn!("[SyncEngine] Audit append failed: {}", err);
        }
    }
}

fn kind_name(kind: SyncItemKind) -> &'static str {
    match kind {
        SyncItemKind::Attendance => "attendance",
        SyncItemKind::Biometric => "biometric",
        SyncItemKind::Verification => "verification",
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    item: &PendingSyncItem,
) -> std::result::Result<T, RemoteError> {
    serde_json::from_str(&item.payload).map_err(|err| {
        RemoteError::permanent(format!("Malformed {} payload: {}", kind_name(item.kind), err))
    })
}
