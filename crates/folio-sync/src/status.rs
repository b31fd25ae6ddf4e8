//! # Status Reporter
//!
//! Read-only aggregation of everything the UI needs to render
//! "Synced / Pending / Offline".
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  isOnline        ◄── ConnectivityMonitor (cached flag)                 │
//! │  pendingSync     ◄── documents WHERE sync_status != 'synced'           │
//! │  failedSyncLogs  ◄── sync_logs WHERE resolved = 0                      │
//! │  lastSync        ◄── settings['last_sync']                             │
//! │  pendingUploads  ◄── RetryQueue length                                 │
//! │  remoteStatus    ◄── GET /sync/status (online + token, errors dropped) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use folio_core::{SyncStatus, SETTING_LAST_SYNC};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connectivity::ConnectivityMonitor;
use crate::credentials::CredentialStore;
use crate::error::SyncResult;
use crate::remote::RemoteApi;
use crate::retry_queue::RetryQueue;
use crate::store::LocalStore;

/// Builds [`SyncStatus`] snapshots. Never mutates state.
pub struct StatusReporter {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    credentials: Arc<CredentialStore>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: Arc<Mutex<RetryQueue>>,
}

impl StatusReporter {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        credentials: Arc<CredentialStore>,
        connectivity: Arc<ConnectivityMonitor>,
        queue: Arc<Mutex<RetryQueue>>,
    ) -> Self {
        StatusReporter {
            store,
            remote,
            credentials,
            connectivity,
            queue,
        }
    }

    /// Computes a fresh snapshot.
    pub async fn snapshot(&self) -> SyncResult<SyncStatus> {
        let is_online = self.connectivity.is_online();
        let pending_sync = self.store.count_dirty().await?;
        let failed_sync_logs = self.store.count_pending_sync_logs().await?;
        let last_sync = self.store.get_setting(SETTING_LAST_SYNC).await?;
        let pending_uploads = self.queue.lock().await.len() as i64;

        let remote_status = if is_online {
            match self.credentials.auth_token().await {
                Ok(token) => match self.remote.sync_status(&token).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        debug!(error = %e, "Remote status unavailable");
                        None
                    }
                },
                Err(_) => None,
            }
        } else {
            None
        };

        Ok(SyncStatus {
            is_online,
            pending_sync,
            pending_uploads,
            failed_sync_logs,
            last_sync,
            remote_status,
            sync_in_progress: pending_uploads > 0,
            has_pending_uploads: pending_uploads > 0,
        })
    }
}
