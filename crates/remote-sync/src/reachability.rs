//! Health-endpoint polling probe feeding the reachability signal.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use fieldmark_core::errors::{Error, Result};
use fieldmark_core::sync::{ReachabilityMonitor, WatchReachability};

const HEALTH_PATH: &str = "/api/v1/health";
const PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

/// Polls the backend health endpoint and publishes transitions through a
/// watch channel. Conservative by construction: the signal starts offline
/// and only a successful probe flips it online.
pub struct HttpReachabilityProbe {
    state: WatchReachability,
    client: reqwest::Client,
    health_url: String,
    interval_secs: u64,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpReachabilityProbe {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_interval(base_url, DEFAULT_PROBE_INTERVAL_SECS)
    }

    pub fn with_interval(base_url: &str, interval_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::configuration(format!("Failed building probe client: {}", e)))?;

        Ok(Self {
            state: WatchReachability::new(false),
            client,
            health_url: format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH),
            interval_secs,
            background_task: Mutex::new(None),
        })
    }

    /// Starts the polling loop. Idempotent: a running loop is left alone.
    pub async fn start(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let state = self.state.clone();
        let client = self.client.clone();
        let health_url = self.health_url.clone();
        let interval_secs = self.interval_secs;

        let handle = tokio::spawn(async move {
            info!(
                "[Reachability] Probing {} every {}s",
                health_url, interval_secs
            );
            loop {
                let online = match client.get(&health_url).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        debug!("[Reachability] Probe failed: {}", e);
                        false
                    }
                };
                state.set_online(online);
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            }
        });
        *guard = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.background_task.lock().await.take() {
            handle.abort();
        }
        self.state.set_online(false);
    }
}

impl ReachabilityMonitor for HttpReachabilityProbe {
    fn is_online(&self) -> bool {
        self.state.is_online()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
