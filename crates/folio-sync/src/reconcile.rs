//! # Reconciler
//!
//! Upload and download protocols between the local store and the remote
//! server, plus the backup export/import path.
//!
//! ## Upload
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upload_one(doc)                                                        │
//! │  1. online?            no  ⇒ Offline          (no request)             │
//! │  2. token?             no  ⇒ Unauthenticated  (no request)             │
//! │  3. read file_path     missing ⇒ metadata-only upload                  │
//! │  4. POST /documents/upload  (file + data JSON, 30 s)                   │
//! │  5. ⇒ server id        (caller marks synced)                           │
//! │                                                                         │
//! │  upload_documents(docs)                                                 │
//! │  every doc gets an attempt; ok ⇒ mark synced + leave queue             │
//! │                             err ⇒ enqueue for retry                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Download
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /documents/sync?since=<last_sync>                                 │
//! │        │  request fails ⇒ error, mark NOT advanced                     │
//! │        ▼                                                                │
//! │  for each remote doc:                                                   │
//! │     match local by server_id, then by filename                         │
//! │     found   ⇒ update processed fields        (updated += 1)            │
//! │     missing ⇒ insert as synced               (imported += 1)           │
//! │     error   ⇒ log, failed += 1, continue                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  persist lastSync                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use folio_core::validation::validate_remote_document;
use folio_core::{
    CoreError, Document, DocumentPatch, DownloadReport, ExportBundle, ImportReport, NewDocument,
    RemoteDocument, UploadMetadata, UploadOutcome, UploadReport, BUNDLE_VERSION,
    SETTING_LAST_SYNC,
};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::credentials::CredentialStore;
use crate::error::{SyncError, SyncResult};
use crate::events::SyncEventEmitter;
use crate::remote::{DocumentUpload, FilePart, RemoteApi};
use crate::retry_queue::RetryQueue;
use crate::store::LocalStore;

/// How a remote record was applied locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
}

/// Upload/download protocols. Never retries inline.
pub struct Reconciler {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    credentials: Arc<CredentialStore>,
    connectivity: Arc<ConnectivityMonitor>,
    emitter: Arc<dyn SyncEventEmitter>,
    queue: Arc<Mutex<RetryQueue>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        credentials: Arc<CredentialStore>,
        connectivity: Arc<ConnectivityMonitor>,
        emitter: Arc<dyn SyncEventEmitter>,
        queue: Arc<Mutex<RetryQueue>>,
    ) -> Self {
        Reconciler {
            store,
            remote,
            credentials,
            connectivity,
            emitter,
            queue,
        }
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Uploads one document and returns the server-assigned id.
    ///
    /// Preconditions are checked before any I/O. The caller owns marking
    /// the record synced and all queue bookkeeping.
    pub async fn upload_one(&self, doc: &Document) -> SyncResult<String> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }
        let token = self.credentials.valid_token().await?;

        let upload = DocumentUpload {
            metadata: UploadMetadata::from(doc),
            file: read_file_part(doc).await?,
        };

        let server_id = self.remote.upload_document(&token, &upload).await?;
        debug!(document_id = doc.id, server_id = %server_id, "Document uploaded");
        Ok(server_id)
    }

    /// Attempts every document; successes are marked synced and leave the
    /// queue, failures are enqueued for retry.
    pub async fn upload_documents(&self, docs: Vec<Document>) -> UploadReport {
        let total = docs.len() as u32;
        let mut report = UploadReport::default();

        for (index, doc) in docs.into_iter().enumerate() {
            let result = match self.upload_one(&doc).await {
                Ok(server_id) => self
                    .store
                    .mark_synced(doc.id, &server_id)
                    .await
                    .map(|()| server_id),
                Err(e) => Err(e),
            };

            match result {
                Ok(server_id) => {
                    self.queue.lock().await.remove(doc.id);
                    report.push(UploadOutcome {
                        document_id: doc.id,
                        filename: doc.filename.clone(),
                        server_id: Some(server_id),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(document_id = doc.id, filename = %doc.filename, error = %e, "Upload failed");
                    let outcome = UploadOutcome {
                        document_id: doc.id,
                        filename: doc.filename.clone(),
                        server_id: None,
                        error: Some(e.to_string()),
                    };
                    self.enqueue(doc).await;
                    report.push(outcome);
                }
            }

            self.emitter.emit_progress(index as u32 + 1, total);
        }

        if report.has_failures() {
            let err = SyncError::PartialBatchFailure {
                failed: report.failed,
                total,
            };
            self.emitter.emit_error(&err.to_string(), err.is_retryable());
        }

        info!(
            uploaded = report.uploaded,
            failed = report.failed,
            "Upload batch complete"
        );
        report
    }

    /// Adds a document to the retry queue. A full queue leaves it pending
    /// in the store, where the next upload pass finds it.
    pub async fn enqueue(&self, doc: Document) -> bool {
        let id = doc.id;
        let accepted = self.queue.lock().await.enqueue(doc, Instant::now());
        if !accepted {
            warn!(document_id = id, "Retry queue full, document stays pending");
        }
        accepted
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Pulls remote changes since the stored high-water mark.
    pub async fn download_documents(&self) -> SyncResult<DownloadReport> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }
        let token = self.credentials.valid_token().await?;

        let since = self.store.get_setting(SETTING_LAST_SYNC).await?;
        let batch = self.remote.fetch_changes(&token, since.as_deref()).await?;

        let now = Utc::now();
        let mut report = DownloadReport::default();
        let total = batch.documents.len() as u32;

        for (index, remote_doc) in batch.documents.iter().enumerate() {
            match self.apply_remote(remote_doc, now).await {
                Ok(Applied::Inserted) => report.imported += 1,
                Ok(Applied::Updated) => report.updated += 1,
                Err(e) => {
                    warn!(server_id = %remote_doc.id, filename = %remote_doc.filename, error = %e, "Failed to apply remote document");
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{}: {}", remote_doc.filename, e));
                }
            }
            self.emitter.emit_progress(index as u32 + 1, total);
        }

        report.last_sync = match batch.last_sync {
            Some(mark) => {
                self.store
                    .set_settings(&[(SETTING_LAST_SYNC, mark.as_str())])
                    .await?;
                Some(mark)
            }
            None => since,
        };

        info!(
            imported = report.imported,
            updated = report.updated,
            failed = report.failed,
            "Download complete"
        );
        Ok(report)
    }

    async fn apply_remote(&self, remote_doc: &RemoteDocument, now: DateTime<Utc>) -> SyncResult<Applied> {
        validate_remote_document(remote_doc)?;

        let existing = match self.store.find_by_server_id(&remote_doc.id).await? {
            Some(doc) => Some(doc),
            None => self.store.find_by_filename(&remote_doc.filename).await?,
        };

        match existing {
            Some(local) => {
                let patch = DocumentPatch::from_remote(remote_doc, &local, now);
                self.store.update_document(local.id, &patch).await?;
                Ok(Applied::Updated)
            }
            None => {
                self.store
                    .insert_document(&NewDocument::from_remote(remote_doc, now))
                    .await?;
                Ok(Applied::Inserted)
            }
        }
    }

    // =========================================================================
    // Backup
    // =========================================================================

    /// Exports local data, attaching the server's export when reachable.
    ///
    /// Offline or a failing server call degrades to a local-only bundle.
    pub async fn export_data(&self) -> SyncResult<ExportBundle> {
        let local = self.store.export_local().await?;

        let server = if self.connectivity.is_online() {
            match self.credentials.valid_token().await {
                Ok(token) => match self.remote.export_data(&token).await {
                    Ok(data) => Some(data),
                    Err(e) => {
                        warn!(error = %e, "Server export failed, exporting local data only");
                        None
                    }
                },
                Err(_) => {
                    debug!("Not authenticated, exporting local data only");
                    None
                }
            }
        } else {
            None
        };

        Ok(ExportBundle { local, server })
    }

    /// Applies a bundle locally, then re-uploads the imported documents
    /// when online and authenticated.
    pub async fn import_data(&self, bundle: &ExportBundle) -> SyncResult<ImportReport> {
        let version = bundle.local.version;
        if version == 0 {
            return Err(CoreError::InvalidBundle {
                reason: "missing bundle version".to_string(),
            }
            .into());
        }
        if version > BUNDLE_VERSION {
            return Err(CoreError::UnsupportedBundleVersion {
                found: version,
                supported: BUNDLE_VERSION,
            }
            .into());
        }

        let outcome = self.store.import_local(&bundle.local).await?;
        let mut report = ImportReport {
            documents_inserted: outcome.inserted.len() as u32,
            documents_updated: outcome.updated.len() as u32,
            sync_logs_restored: outcome.sync_logs_restored,
            settings_restored: outcome.settings_restored,
            upload: None,
        };

        if self.connectivity.is_online() && self.credentials.is_authenticated().await {
            let mut docs = Vec::new();
            for id in outcome.document_ids() {
                if let Some(doc) = self.store.get_document(id).await? {
                    docs.push(doc);
                }
            }
            report.upload = Some(self.upload_documents(docs).await);
        } else {
            debug!("Offline or unauthenticated, skipping re-upload after import");
        }

        Ok(report)
    }
}

/// Reads the file behind a document. A missing file means metadata only.
async fn read_file_part(doc: &Document) -> SyncResult<Option<FilePart>> {
    let Some(path) = doc.file_path.as_deref() else {
        return Ok(None);
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(FilePart {
            file_name: doc.filename.clone(),
            mime_type: doc.file_type.clone(),
            bytes,
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(document_id = doc.id, path = %path, "File missing, uploading metadata only");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
