//! # Sync Engine
//!
//! Orchestrator for the sync components. Owns the retry queue, the drain
//! lock and the background task handles.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncEngine                               │  │
//! │  │  start() / stop()  •  drain_queue()  •  sync_now()  •  status()  │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │      ┌───────────────┬────────┴───────┬────────────────┐               │
//! │      ▼               ▼                ▼                ▼                │
//! │  ┌──────────┐  ┌────────────┐  ┌────────────┐  ┌──────────────┐        │
//! │  │Connectiv-│  │ Credential │  │ Reconciler │  │ StatusReport │        │
//! │  │ity probe │  │ Store      │  │            │  │              │        │
//! │  │ (30 s)   │  │            │  │ upload /   │  │ snapshot     │        │
//! │  └──────────┘  └────────────┘  │ download   │  └──────────────┘        │
//! │                                └─────┬──────┘                           │
//! │                                      ▼                                  │
//! │                           ┌────────────────────┐                        │
//! │                           │ RetryQueue (5 min  │                        │
//! │                           │ drain, one at once)│                        │
//! │                           └────────────────────┘                        │
//! │                                                                         │
//! │  MODES:                                                                 │
//! │  • auto    - probe + drain timers                                      │
//! │  • manual  - probe timer only, drain on request                        │
//! │  • offline - no timers, no network                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use folio_core::{
    CoreError, Credential, Document, DocumentId, DownloadReport, DrainReport, DrainSkip,
    ExportBundle, ImportReport, NewSyncLog, QueueItem, SyncLog, SyncReport, SyncState,
    SyncStatus, UploadReport, DOCUMENTS_TABLE, LOG_KIND_UPLOAD_FAILED,
};
use folio_db::Database;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::credentials::CredentialStore;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, SyncEventEmitter};
use crate::reconcile::Reconciler;
use crate::remote::{HttpRemote, RemoteApi};
use crate::retry_queue::{FailureOutcome, RetryPolicy, RetryQueue};
use crate::status::StatusReporter;
use crate::store::LocalStore;

// =============================================================================
// Shared Core
// =============================================================================

/// State shared between the engine handle and its background tasks.
struct EngineCore {
    config: Arc<SyncConfig>,
    store: Arc<dyn LocalStore>,
    emitter: Arc<dyn SyncEventEmitter>,
    connectivity: Arc<ConnectivityMonitor>,
    credentials: Arc<CredentialStore>,
    reconciler: Reconciler,
    reporter: StatusReporter,
    queue: Arc<Mutex<RetryQueue>>,
    /// Held for the duration of one drain pass.
    drain_lock: Mutex<()>,
}

impl EngineCore {
    /// One pass over the ready queue items.
    async fn drain_queue(&self) -> SyncResult<DrainReport> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("Drain already running, skipping tick");
            return Ok(DrainReport::skipped(DrainSkip::InProgress));
        };

        if !self.connectivity.is_online() {
            debug!("Offline, skipping queue drain");
            return Ok(DrainReport::skipped(DrainSkip::Offline));
        }

        let items = {
            let mut queue = self.queue.lock().await;
            if queue.is_empty() {
                return Ok(DrainReport::skipped(DrainSkip::Empty));
            }
            queue.snapshot(Instant::now())
        };

        debug!(ready = items.len(), "Draining retry queue");
        let mut report = DrainReport::default();

        for item in items {
            let id = item.document_id();

            // The store is authoritative; the queued copy may be stale.
            let doc = match self.store.get_document(id).await {
                Ok(Some(doc)) if doc.sync_status == SyncState::Synced => {
                    debug!(document_id = id, "Already synced, dropping from queue");
                    self.queue.lock().await.remove(id);
                    continue;
                }
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    warn!(document_id = id, "Queued document no longer exists");
                    self.queue.lock().await.remove(id);
                    continue;
                }
                Err(e) => {
                    error!(document_id = id, error = %e, "Failed to load queued document");
                    self.queue.lock().await.release(id);
                    continue;
                }
            };

            report.attempted += 1;
            let result = match self.reconciler.upload_one(&doc).await {
                Ok(server_id) => self.store.mark_synced(id, &server_id).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.queue.lock().await.remove(id);
                    report.succeeded += 1;
                    info!(document_id = id, "Queued upload succeeded");
                }
                Err(e) => {
                    let outcome = self.queue.lock().await.record_failure(id, Instant::now());
                    match outcome {
                        FailureOutcome::Rescheduled {
                            retry_count,
                            ready_at,
                        } => {
                            report.rescheduled += 1;
                            let delay = ready_at.saturating_duration_since(Instant::now());
                            warn!(
                                document_id = id,
                                retry_count,
                                retry_in_ms = delay.as_millis() as u64,
                                error = %e,
                                "Queued upload failed, rescheduled"
                            );
                        }
                        FailureOutcome::Exhausted { item } => {
                            report.exhausted += 1;
                            self.demote(&item, &e).await;
                        }
                        FailureOutcome::Missing => {
                            debug!(document_id = id, "Item left the queue during upload");
                        }
                    }
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            rescheduled = report.rescheduled,
            exhausted = report.exhausted,
            "Queue drain complete"
        );
        self.emit_status().await;
        Ok(report)
    }

    /// Terminal failure: one audit entry, record marked failed.
    async fn demote(&self, item: &QueueItem, err: &SyncError) {
        let id = item.document_id();
        error!(
            document_id = id,
            retry_count = item.retry_count,
            error = %err,
            "Upload retries exhausted"
        );

        let entry = NewSyncLog {
            kind: LOG_KIND_UPLOAD_FAILED.to_string(),
            table_name: DOCUMENTS_TABLE.to_string(),
            record_id: id.to_string(),
            payload: json!({
                "filename": item.document.filename,
                "retryCount": item.retry_count,
                "enqueuedAt": item.enqueued_at,
                "error": err.to_string(),
            }),
        };
        // On error the document stays pending and the next restore or
        // upload pass picks it up again.
        if let Err(e) = self.store.fail_document(id, &entry).await {
            error!(document_id = id, error = %e, "Failed to record terminal upload failure");
        }

        self.emitter.emit_error(
            &format!(
                "Upload of {} failed after {} attempts: {}",
                item.document.filename, item.retry_count, err
            ),
            false,
        );
    }

    async fn emit_status(&self) {
        match self.reporter.snapshot().await {
            Ok(status) => self.emitter.emit_status(&status),
            Err(e) => warn!(error = %e, "Failed to compute sync status"),
        }
    }

    /// Drains on every interval tick until shutdown. The first drain runs
    /// one interval after start.
    async fn run_drain_loop(self: Arc<Self>, every: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(interval_secs = every.as_secs(), "Queue drain loop starting");

        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain_queue().await {
                        error!(?e, "Queue drain failed");
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Queue drain loop shutting down");
                    break;
                }
            }
        }

        info!("Queue drain loop stopped");
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Process-wide sync orchestrator.
pub struct SyncEngine {
    core: Arc<EngineCore>,

    /// Shutdown senders for the probe and drain tasks.
    shutdown_txs: Vec<mpsc::Sender<()>>,

    /// Background task handles (set after start).
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Creates an engine talking HTTP to the configured server.
    pub async fn new(config: SyncConfig, db: Arc<Database>) -> SyncResult<Self> {
        let remote = Arc::new(HttpRemote::new(&config)?);
        Self::with_parts(config, db, remote, Arc::new(NoOpEmitter)).await
    }

    /// Creates an engine from explicit collaborators.
    pub async fn with_parts(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let connectivity = Arc::new(ConnectivityMonitor::new(
            remote.clone(),
            emitter.clone(),
            config.mode(),
        ));
        let credentials = Arc::new(
            CredentialStore::load(store.clone(), remote.clone(), connectivity.clone()).await?,
        );

        let policy = RetryPolicy {
            max_retries: config.sync.max_retries,
            base_delay: config.retry_base_delay(),
        };
        let queue = Arc::new(Mutex::new(RetryQueue::new(policy, config.sync.max_queue_len)));

        let reconciler = Reconciler::new(
            store.clone(),
            remote.clone(),
            credentials.clone(),
            connectivity.clone(),
            emitter.clone(),
            queue.clone(),
        );
        let reporter = StatusReporter::new(
            store.clone(),
            remote,
            credentials.clone(),
            connectivity.clone(),
            queue.clone(),
        );

        Ok(SyncEngine {
            core: Arc::new(EngineCore {
                config,
                store,
                emitter,
                connectivity,
                credentials,
                reconciler,
                reporter,
                queue,
                drain_lock: Mutex::new(()),
            }),
            shutdown_txs: Vec::new(),
            tasks: Vec::new(),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the background tasks for the configured mode.
    ///
    /// Pending documents in the store are loaded into the queue first, so
    /// work left over from a previous run is drained.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let mode = self.core.config.mode();
        if !mode.is_sync_enabled() {
            info!("Sync is disabled (mode: offline)");
            self.core.connectivity.set_online(false);
            return Ok(());
        }

        let restored = self.restore_queue().await?;
        info!(mode = %mode, restored, "Starting sync engine");

        let (probe_tx, probe_rx) = mpsc::channel(1);
        let connectivity = self.core.connectivity.clone();
        self.tasks.push(tokio::spawn(
            connectivity.run(self.core.config.connectivity_interval(), probe_rx),
        ));
        self.shutdown_txs.push(probe_tx);

        if mode.drains_automatically() {
            let (drain_tx, drain_rx) = mpsc::channel(1);
            let core = self.core.clone();
            self.tasks.push(tokio::spawn(
                core.run_drain_loop(self.core.config.drain_interval(), drain_rx),
            ));
            self.shutdown_txs.push(drain_tx);
        }

        info!("Sync engine started");
        Ok(())
    }

    /// Signals both timers to stop. In-flight requests run to completion.
    pub async fn stop(&mut self) {
        info!("Stopping sync engine");

        for tx in self.shutdown_txs.drain(..) {
            let _ = tx.send(()).await;
        }
        self.tasks.clear();

        info!("Sync engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Loads every `pending` document from the store into the queue.
    pub async fn restore_queue(&self) -> SyncResult<usize> {
        let docs = self.core.store.dirty_documents().await?;
        let mut restored = 0;
        for doc in docs.into_iter().filter(|d| d.sync_status == SyncState::Pending) {
            if self.core.reconciler.enqueue(doc).await {
                restored += 1;
            }
        }
        Ok(restored)
    }

    // =========================================================================
    // Connectivity & Credentials
    // =========================================================================

    /// Runs one health probe now.
    pub async fn check_connectivity(&self) -> bool {
        self.core.connectivity.probe().await
    }

    pub fn is_online(&self) -> bool {
        self.core.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.core.connectivity
    }

    pub async fn login(&self, email: &str, password: &str) -> SyncResult<Credential> {
        self.core.credentials.login(email, password).await
    }

    pub async fn logout(&self) -> SyncResult<()> {
        self.core.credentials.logout().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.core.credentials.is_authenticated().await
    }

    pub async fn refresh_token(&self) -> bool {
        self.core.credentials.refresh_token().await
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Adds a stored document to the retry queue.
    pub async fn enqueue(&self, id: DocumentId) -> SyncResult<bool> {
        let doc = self.require_document(id).await?;
        if doc.sync_status == SyncState::Synced {
            debug!(document_id = id, "Document already synced, not queued");
            return Ok(false);
        }
        Ok(self.core.reconciler.enqueue(doc).await)
    }

    /// Runs one drain pass now.
    pub async fn drain_queue(&self) -> SyncResult<DrainReport> {
        self.core.drain_queue().await
    }

    /// Drains until the queue is empty or every remaining item has used its
    /// retries, sleeping until the next deferred item is due between passes.
    ///
    /// Stops early when a pass is skipped, or when nothing was attempted
    /// although an item was due (the store could not load it).
    pub async fn drain_until_settled(&self) -> SyncResult<Vec<DrainReport>> {
        let mut passes = Vec::new();
        loop {
            let report = self.core.drain_queue().await?;
            let skipped = report.skipped.is_some();
            let attempted = report.attempted;
            passes.push(report);
            if skipped {
                break;
            }

            let Some(next) = self.core.queue.lock().await.next_ready_at() else {
                break;
            };
            if attempted == 0 && next <= Instant::now() {
                warn!(passes = passes.len(), "Queue drain made no progress, stopping");
                break;
            }

            debug!(
                wait_ms = next.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Waiting for next queued retry"
            );
            tokio::time::sleep_until(next).await;
        }
        Ok(passes)
    }

    /// Uploads that used all their retries and were not retried since.
    pub async fn sync_failures(&self) -> SyncResult<Vec<SyncLog>> {
        self.core.store.pending_sync_logs().await
    }

    /// Moves a failed document back to pending and queues it again.
    pub async fn retry_failed(&self, id: DocumentId) -> SyncResult<bool> {
        let doc = self.require_document(id).await?;
        if doc.sync_status == SyncState::Synced {
            info!(document_id = id, "Document already synced, nothing to retry");
            return Ok(false);
        }

        self.core.store.mark_pending(id).await?;
        let resolved = self
            .core
            .store
            .resolve_sync_logs(DOCUMENTS_TABLE, &id.to_string())
            .await?;

        let doc = self.require_document(id).await?;
        let queued = self.core.reconciler.enqueue(doc).await;
        info!(document_id = id, resolved, queued, "Manual resync requested");
        Ok(queued)
    }

    /// Ids currently in the retry queue, in queue order.
    pub async fn queued_ids(&self) -> Vec<DocumentId> {
        self.core.queue.lock().await.ids()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Uploads the given documents. Failures are queued, never fatal.
    pub async fn upload(&self, ids: &[DocumentId]) -> SyncResult<UploadReport> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            docs.push(self.require_document(*id).await?);
        }
        Ok(self.core.reconciler.upload_documents(docs).await)
    }

    /// Uploads every `pending` document.
    pub async fn upload_pending(&self) -> SyncResult<UploadReport> {
        let docs: Vec<Document> = self
            .core
            .store
            .dirty_documents()
            .await?
            .into_iter()
            .filter(|d| d.sync_status == SyncState::Pending)
            .collect();
        Ok(self.core.reconciler.upload_documents(docs).await)
    }

    pub async fn download(&self) -> SyncResult<DownloadReport> {
        self.core.reconciler.download_documents().await
    }

    /// Uploads every pending document, then downloads remote changes.
    pub async fn sync_now(&self) -> SyncResult<SyncReport> {
        if !self.core.connectivity.is_online() {
            return Err(SyncError::Offline);
        }
        self.core.credentials.auth_token().await?;

        info!("Manual sync started");
        let upload = self.upload_pending().await?;

        let mut report = SyncReport {
            upload,
            download: None,
            download_error: None,
        };
        match self.core.reconciler.download_documents().await {
            Ok(download) => report.download = Some(download),
            Err(e) => {
                warn!(error = %e, "Download failed during manual sync");
                self.core.emitter.emit_error(&e.to_string(), e.is_retryable());
                report.download_error = Some(e.to_string());
            }
        }

        self.core.emit_status().await;
        Ok(report)
    }

    pub async fn export_data(&self) -> SyncResult<ExportBundle> {
        self.core.reconciler.export_data().await
    }

    pub async fn import_data(&self, bundle: &ExportBundle) -> SyncResult<ImportReport> {
        self.core.reconciler.import_data(bundle).await
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn status(&self) -> SyncResult<SyncStatus> {
        self.core.reporter.snapshot().await
    }

    async fn require_document(&self, id: DocumentId) -> SyncResult<Document> {
        self.core
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| CoreError::DocumentNotFound(id.to_string()).into())
    }
}
