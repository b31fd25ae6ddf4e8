//! # Connectivity Monitor
//!
//! Caches whether the remote server is reachable.
//!
//! ## Probe Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Connectivity Monitor                                │
//! │                                                                         │
//! │  start ──► probe ──► tick (30 s) ──► probe ──► tick ──► ...            │
//! │              │                         │                                │
//! │              ▼                         ▼                                │
//! │        GET /health (5 s)         GET /health (5 s)                      │
//! │        2xx ⇒ online             anything else ⇒ offline                 │
//! │              │                                                          │
//! │              ▼                                                          │
//! │     watch::Sender<bool> ──► is_online() / subscribe()                   │
//! │                                                                         │
//! │  • No retries inside a probe; the next tick is the retry               │
//! │  • Readers never probe, they read the cached flag                      │
//! │  • `offline` mode never probes and always reads false                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::events::SyncEventEmitter;
use crate::remote::RemoteApi;

/// Cached online/offline state backed by periodic health probes.
pub struct ConnectivityMonitor {
    remote: Arc<dyn RemoteApi>,
    emitter: Arc<dyn SyncEventEmitter>,
    mode: SyncMode,
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor that starts offline until the first probe.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        emitter: Arc<dyn SyncEventEmitter>,
        mode: SyncMode,
    ) -> Self {
        let (state, _) = watch::channel(false);
        ConnectivityMonitor {
            remote,
            emitter,
            mode,
            state,
        }
    }

    /// Returns the cached state. Never touches the network.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Returns a receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Issues one health probe and updates the cached state.
    pub async fn probe(&self) -> bool {
        if !self.mode.is_sync_enabled() {
            self.set_online(false);
            return false;
        }

        let online = match self.remote.health().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        };
        self.set_online(online);
        online
    }

    /// Stores a new state. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.state.send_replace(online);
        if previous == online {
            return false;
        }

        if online {
            info!("Remote server reachable, now online");
        } else {
            warn!("Remote server unreachable, now offline");
        }
        self.emitter.emit_connectivity(online);
        true
    }

    /// Probes immediately, then on every interval tick until shutdown.
    pub async fn run(self: Arc<Self>, every: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(interval_secs = every.as_secs(), "Connectivity monitor starting");

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.probe().await;
                }

                _ = shutdown_rx.recv() => {
                    info!("Connectivity monitor shutting down");
                    break;
                }
            }
        }

        info!("Connectivity monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRemote, RecordingEmitter};

    fn monitor(remote: Arc<FakeRemote>, mode: SyncMode) -> (ConnectivityMonitor, Arc<RecordingEmitter>) {
        let emitter = Arc::new(RecordingEmitter::default());
        (ConnectivityMonitor::new(remote, emitter.clone(), mode), emitter)
    }

    #[tokio::test]
    async fn test_starts_offline_and_probe_goes_online() {
        let remote = Arc::new(FakeRemote::new());
        let (monitor, emitter) = monitor(remote.clone(), SyncMode::Auto);

        assert!(!monitor.is_online());
        assert!(monitor.probe().await);
        assert!(monitor.is_online());
        assert_eq!(remote.calls("health"), 1);
        assert_eq!(emitter.connectivity(), vec![true]);
    }

    #[tokio::test]
    async fn test_failed_probe_goes_offline() {
        let remote = Arc::new(FakeRemote::new());
        let (monitor, emitter) = monitor(remote.clone(), SyncMode::Auto);
        monitor.probe().await;

        remote.set_reachable(false);
        assert!(!monitor.probe().await);
        assert!(!monitor.is_online());

        // Repeated failures do not re-emit.
        monitor.probe().await;
        assert_eq!(emitter.connectivity(), vec![true, false]);
        assert_eq!(remote.calls("health"), 3);
    }

    #[tokio::test]
    async fn test_offline_mode_never_probes() {
        let remote = Arc::new(FakeRemote::new());
        let (monitor, emitter) = monitor(remote.clone(), SyncMode::Offline);

        assert!(!monitor.probe().await);
        assert_eq!(remote.calls("health"), 0);
        assert!(emitter.connectivity().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let remote = Arc::new(FakeRemote::new());
        let (monitor, _) = monitor(remote, SyncMode::Auto);
        let mut rx = monitor.subscribe();

        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_run_probes_immediately_and_stops() {
        let remote = Arc::new(FakeRemote::new());
        let (monitor, _) = monitor(remote.clone(), SyncMode::Auto);
        let monitor = Arc::new(monitor);
        let mut rx = monitor.subscribe();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(monitor.clone().run(Duration::from_secs(3600), shutdown_rx));

        rx.changed().await.unwrap();
        assert!(monitor.is_online());

        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
        assert_eq!(remote.calls("health"), 1);
    }
}
