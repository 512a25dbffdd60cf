//! Background scheduling for sync cycles.
//!
//! Three triggers funnel into the same engine entry point: a periodic
//! timer, the offline-to-online reachability edge, and manual requests.
//! The engine's single-flight lock makes overlapping triggers harmless.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::errors::Result;

use super::{CycleOutcome, ReachabilityMonitor, SyncEngine};

/// Periodic cadence defaults. Jitter spreads cycle starts so a fleet of
/// devices regaining connectivity does not stampede the backend.
pub const SYNC_DEFAULT_INTERVAL_SECS: u64 = 15 * 60;
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    pub interval_secs: u64,
    pub jitter_secs: u64,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: SYNC_DEFAULT_INTERVAL_SECS,
            jitter_secs: SYNC_INTERVAL_JITTER_SECS,
        }
    }
}

/// Aggregate status snapshot for the operator UI.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub pending_count: i64,
    pub abandoned_count: i64,
    pub last_sync_time: Option<String>,
    pub last_cycle_status: Option<String>,
    pub next_scheduled_time: Option<String>,
    pub cycle_in_progress: bool,
}

/// Owns the background loop and the "next sync time" contract.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    reachability: Arc<dyn ReachabilityMonitor>,
    config: SyncSchedulerConfig,
    manual_trigger: Arc<Notify>,
    next_run_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        reachability: Arc<dyn ReachabilityMonitor>,
        config: SyncSchedulerConfig,
    ) -> Self {
        Self {
            engine,
            reachability,
            config,
            manual_trigger: Arc::new(Notify::new()),
            next_run_at: Arc::new(RwLock::new(None)),
            background_task: Mutex::new(None),
        }
    }

    /// Starts the background loop. Idempotent: a running loop is left alone.
    pub async fn start(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let manual = Arc::clone(&self.manual_trigger);
        let next_run_at = Arc::clone(&self.next_run_at);
        let mut reachability_rx = self.reachability.subscribe();

        let handle = tokio::spawn(async move {
            info!(
                "[SyncScheduler] Background loop started (interval {}s)",
                config.interval_secs
            );
            let mut monitor_gone = false;
            loop {
                let delay = Duration::from_secs(config.interval_secs) + jitter(config.jitter_secs);
                if let Ok(mut slot) = next_run_at.write() {
                    *slot =
                        Some(Utc::now() + ChronoDuration::milliseconds(delay.as_millis() as i64));
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        debug!("[SyncScheduler] Periodic trigger");
                    }
                    _ = manual.notified() => {
                        debug!("[SyncScheduler] Manual trigger");
                    }
                    changed = reachability_rx.changed(), if !monitor_gone => {
                        if changed.is_err() {
                            // Sender dropped; a closed channel is ready on
                            // every poll, so disarm this branch and run on
                            // the timer and manual triggers alone.
                            warn!("[SyncScheduler] Reachability monitor gone");
                            monitor_gone = true;
                            continue;
                        }
                        let online = *reachability_rx.borrow_and_update();
                        if !online {
                            debug!("[SyncScheduler] Went offline; waiting");
                            continue;
                        }
                        info!("[SyncScheduler] Connectivity regained");
                    }
                }

                match engine.run_cycle().await {
                    Ok(CycleOutcome::Completed(summary)) => {
                        debug!(
                            "[SyncScheduler] Cycle done synced={} retried={} abandoned={}",
                            summary.synced, summary.retried, summary.abandoned
                        );
                    }
                    Ok(CycleOutcome::AlreadyRunning) | Ok(CycleOutcome::Offline) => {}
                    Err(err) => {
                        warn!("[SyncScheduler] Cycle failed: {}", err);
                    }
                }
            }
        });
        *guard = Some(handle);
    }

    /// Stops the background loop. A cycle interrupted here leaves the outbox
    /// resumable: items only leave `Pending` after confirmed success.
    pub async fn stop(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
            info!("[SyncScheduler] Background loop stopped");
        }
        if let Ok(mut slot) = self.next_run_at.write() {
            *slot = None;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.background_task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Queues a "Sync Now" request into the background loop.
    pub fn request_manual_sync(&self) {
        self.manual_trigger.notify_one();
    }

    /// Runs a cycle inline and returns its outcome; the single-flight lock
    /// still applies.
    pub async fn sync_now(&self) -> Result<CycleOutcome> {
        self.engine.run_cycle().await
    }

    pub fn next_scheduled_time(&self) -> Option<String> {
        self.next_run_at
            .read()
            .ok()
            .and_then(|slot| slot.map(|at| at.to_rfc3339()))
    }

    /// Aggregate snapshot; pure read, never blocks on a running cycle.
    pub fn status(&self) -> Result<SyncStatus> {
        let engine_status = self.engine.status()?;
        Ok(SyncStatus {
            is_online: engine_status.is_online,
            pending_count: engine_status.pending_count,
            abandoned_count: engine_status.abandoned_count,
            last_sync_time: engine_status.last_sync_time,
            last_cycle_status: engine_status.last_cycle_status,
            next_scheduled_time: self.next_scheduled_time(),
            cycle_in_progress: engine_status.cycle_in_progress,
        })
    }
}

fn jitter(bound_secs: u64) -> Duration {
    let bound_ms = bound_secs.saturating_mul(1000);
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = Utc::now().timestamp_millis().unsigned_abs() % bound_ms;
    Duration::from_millis(jitter_ms)
}
