//! Network reachability contract.

use std::sync::Arc;
use tokio::sync::watch;

/// Connectivity signal source consumed by the engine and scheduler.
///
/// Any `false`/unknown state means "do not attempt network calls".
pub trait ReachabilityMonitor: Send + Sync {
    fn is_online(&self) -> bool;

    /// Stream of connectivity transitions; the scheduler watches for the
    /// offline-to-online edge.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Watch-channel backed monitor fed by platform glue (or tests).
#[derive(Debug, Clone)]
pub struct WatchReachability {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl WatchReachability {
    pub fn new(initially_online: bool) -> Self {
        let (tx, rx) = watch::channel(initially_online);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn set_online(&self, online: bool) {
        // send only fails with no receivers; we always hold one.
        let _ = self.tx.send(online);
    }
}

impl ReachabilityMonitor for WatchReachability {
    fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}
