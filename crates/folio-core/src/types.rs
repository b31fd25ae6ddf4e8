//! # Domain Types
//!
//! Core types used throughout Folio sync.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Document     │   │   QueueItem     │   │    SyncLog      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (local)     │   │  document       │   │  id (UUID)      │       │
//! │  │  filename (key) │   │  retry_count    │   │  kind           │       │
//! │  │  sync_status    │   │  enqueued_at    │   │  record_id      │       │
//! │  │  server_id      │   └─────────────────┘   │  resolved       │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SyncState     │   │   SyncStatus    │   │  ExportBundle   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Pending        │   │  isOnline       │   │  local          │       │
//! │  │  Synced         │   │  pendingSync    │   │  server (opt)   │       │
//! │  │  Failed         │   │  pendingUploads │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: local integer key, stable for the lifetime of the local store
//! - `filename`: natural key used to match remote records
//! - `server_id`: assigned by the remote after the first successful upload

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Local document identifier.
pub type DocumentId = i64;

// =============================================================================
// Sync State
// =============================================================================

/// Synchronization state of a local document.
///
/// ## Lifecycle
/// ```text
///   created ──► Pending ──(upload ok)──► Synced
///                  │
///                  └──(retries exhausted)──► Failed ──(manual resync)──► Pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Not yet confirmed by the remote server.
    #[default]
    Pending,
    /// Uploaded and acknowledged; `server_id` is set.
    Synced,
    /// Retry budget exhausted; waiting for a manual resync.
    Failed,
}

impl SyncState {
    /// Returns true when the document still needs to reach the server.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, SyncState::Synced)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Pending => write!(f, "pending"),
            SyncState::Synced => write!(f, "synced"),
            SyncState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SyncState {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncState::Pending),
            "synced" => Ok(SyncState::Synced),
            "failed" => Ok(SyncState::Failed),
            _ => Err(crate::ValidationError::NotAllowed {
                field: "sync_status".to_string(),
                allowed: vec!["pending".into(), "synced".into(), "failed".into()],
            }),
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// A locally stored document and its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Document {
    pub id: DocumentId,
    /// Natural key used to match remote records.
    pub filename: String,
    /// Path to the original file, when it is still on disk.
    pub file_path: Option<String>,
    /// MIME type or extension reported by the extractor.
    pub file_type: Option<String>,
    /// Original file size in bytes.
    pub file_size: Option<i64>,
    /// Opaque structured output of document processing.
    #[ts(type = "unknown")]
    pub processed_data: Option<Value>,
    pub extracted_text: Option<String>,
    pub confidence_score: Option<f64>,
    /// Processing status (e.g. "completed"), owned by the extractor.
    pub status: String,
    pub sync_status: SyncState,
    /// Id assigned by the remote server after upload.
    pub server_id: Option<String>,
    /// When this document was last reconciled with the server.
    #[ts(as = "Option<String>")]
    pub last_sync: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Returns true when the document has not been confirmed by the server.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.sync_status.is_dirty()
    }
}

/// Fields for inserting a new document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub processed_data: Option<Value>,
    pub extracted_text: Option<String>,
    pub confidence_score: Option<f64>,
    pub status: String,
    pub sync_status: SyncState,
    pub server_id: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl NewDocument {
    /// A freshly processed local document waiting for its first upload.
    pub fn pending(filename: impl Into<String>) -> Self {
        NewDocument {
            filename: filename.into(),
            status: "completed".to_string(),
            sync_status: SyncState::Pending,
            ..Default::default()
        }
    }

    /// A document imported from the remote server.
    pub fn from_remote(remote: &RemoteDocument, now: DateTime<Utc>) -> Self {
        NewDocument {
            filename: remote.filename.clone(),
            file_path: None,
            file_type: remote.file_type.clone(),
            file_size: remote.size,
            processed_data: remote.processed_data.clone(),
            extracted_text: remote.extracted_text.clone(),
            confidence_score: remote.confidence_score,
            status: remote.status.clone().unwrap_or_else(|| "completed".to_string()),
            sync_status: SyncState::Synced,
            server_id: Some(remote.id.clone()),
            last_sync: Some(now),
        }
    }
}

/// In-place update applied when a remote record matches a local one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub processed_data: Option<Value>,
    pub extracted_text: Option<String>,
    pub confidence_score: Option<f64>,
    pub status: String,
    pub last_sync: DateTime<Utc>,
}

impl DocumentPatch {
    /// Builds the whole-record update for a matched remote document.
    pub fn from_remote(remote: &RemoteDocument, local: &Document, now: DateTime<Utc>) -> Self {
        DocumentPatch {
            processed_data: remote.processed_data.clone(),
            extracted_text: remote.extracted_text.clone(),
            confidence_score: remote.confidence_score,
            status: remote.status.clone().unwrap_or_else(|| local.status.clone()),
            last_sync: now,
        }
    }
}

// =============================================================================
// Remote Wire Types
// =============================================================================

/// A document as returned by `GET /documents/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Server id (string or number on the wire).
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub filename: String,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub processed_data: Option<Value>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response body of `GET /documents/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBatch {
    #[serde(default)]
    pub documents: Vec<RemoteDocument>,
    /// New high-water mark to echo on the next request.
    #[serde(default)]
    pub last_sync: Option<String>,
}

/// JSON sidecar sent with every upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub id: DocumentId,
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub size: Option<i64>,
    pub processed_data: Option<Value>,
    pub extracted_text: Option<String>,
    pub confidence_score: Option<f64>,
    pub status: String,
}

impl From<&Document> for UploadMetadata {
    fn from(doc: &Document) -> Self {
        UploadMetadata {
            id: doc.id,
            filename: doc.filename.clone(),
            file_type: doc.file_type.clone(),
            size: doc.file_size,
            processed_data: doc.processed_data.clone(),
            extracted_text: doc.extracted_text.clone(),
            confidence_score: doc.confidence_score,
            status: doc.status.clone(),
        }
    }
}

/// Accepts a server id encoded as either a JSON string or a number.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

// =============================================================================
// Retry Queue Item
// =============================================================================

/// A document waiting in the retry queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub document: Document,
    /// Failed attempts so far.
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(document: Document, enqueued_at: DateTime<Utc>) -> Self {
        QueueItem {
            document,
            retry_count: 0,
            enqueued_at,
        }
    }

    #[inline]
    pub fn document_id(&self) -> DocumentId {
        self.document.id
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// Immutable audit entry appended when a sync attempt terminally fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncLog {
    pub id: String,
    pub kind: String,
    pub table_name: String,
    pub record_id: String,
    #[ts(type = "unknown")]
    pub payload: Value,
    pub resolved: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fields for appending an audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncLog {
    pub kind: String,
    pub table_name: String,
    pub record_id: String,
    pub payload: Value,
}

// =============================================================================
// Credentials
// =============================================================================

/// Bearer token plus cached user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Response body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
}

// =============================================================================
// Status Snapshot
// =============================================================================

/// Point-in-time sync status rendered by the UI. Recomputed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    /// Local documents not yet confirmed synced.
    pub pending_sync: i64,
    /// Items in the retry queue.
    pub pending_uploads: i64,
    /// Unresolved audit log entries (terminal failures).
    pub failed_sync_logs: i64,
    /// Persisted high-water mark of the last completed download.
    pub last_sync: Option<String>,
    /// Best-effort status object reported by the server.
    #[ts(type = "unknown")]
    pub remote_status: Option<Value>,
    pub sync_in_progress: bool,
    pub has_pending_uploads: bool,
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of a single upload inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub document_id: DocumentId,
    pub filename: String,
    pub server_id: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated result of a batch upload. Never all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: u32,
    pub failed: u32,
    pub results: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn push(&mut self, outcome: UploadOutcome) {
        if outcome.is_success() {
            self.uploaded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Aggregated result of a download pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub imported: u32,
    pub updated: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    /// Mark persisted at the end of the pass.
    pub last_sync: Option<String>,
}

/// Why a drain tick did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DrainSkip {
    Offline,
    Empty,
    InProgress,
}

/// Result of one drain pass over the retry queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub rescheduled: u32,
    /// Items that exhausted their retries during this pass.
    pub exhausted: u32,
    pub skipped: Option<DrainSkip>,
}

impl DrainReport {
    pub fn skipped(reason: DrainSkip) -> Self {
        DrainReport {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Result of `sync_now`: upload every pending record, then download.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub upload: UploadReport,
    pub download: Option<DownloadReport>,
    pub download_error: Option<String>,
}

/// Result of `import_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub documents_inserted: u32,
    pub documents_updated: u32,
    pub sync_logs_restored: u32,
    pub settings_restored: u32,
    /// Present when the re-upload step ran.
    pub upload: Option<UploadReport>,
}

// =============================================================================
// Backup Bundles
// =============================================================================

/// Everything the local store can export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalBundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub sync_logs: Vec<SyncLog>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Backup produced by `export_data`: local data plus optional server data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub local: LocalBundle,
    pub server: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Document {
        let now = Utc::now();
        Document {
            id: 1,
            filename: "a.pdf".to_string(),
            file_path: None,
            file_type: Some("application/pdf".to_string()),
            file_size: Some(1024),
            processed_data: Some(json!({"total": 42})),
            extracted_text: Some("hello".to_string()),
            confidence_score: Some(0.9),
            status: "completed".to_string(),
            sync_status: SyncState::Pending,
            server_id: None,
            last_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sync_state_parsing() {
        assert_eq!("pending".parse::<SyncState>().unwrap(), SyncState::Pending);
        assert_eq!("SYNCED".parse::<SyncState>().unwrap(), SyncState::Synced);
        assert!("done".parse::<SyncState>().is_err());
        assert!(SyncState::Failed.is_dirty());
        assert!(!SyncState::Synced.is_dirty());
    }

    #[test]
    fn test_remote_document_accepts_numeric_id() {
        let doc: RemoteDocument = serde_json::from_value(json!({
            "id": 17,
            "filename": "b.pdf",
            "type": "application/pdf",
            "confidenceScore": 0.5
        }))
        .unwrap();
        assert_eq!(doc.id, "17");
        assert_eq!(doc.file_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.status, None);
    }

    #[test]
    fn test_remote_document_rejects_object_id() {
        let result: Result<RemoteDocument, _> =
            serde_json::from_value(json!({"id": {"x": 1}, "filename": "c.pdf"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_metadata_wire_names() {
        let meta = UploadMetadata::from(&sample_document());
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["type"], "application/pdf");
        assert_eq!(value["extractedText"], "hello");
        assert_eq!(value["confidenceScore"], 0.9);
        assert_eq!(value["processedData"]["total"], 42);
    }

    #[test]
    fn test_new_document_from_remote_is_synced() {
        let remote = RemoteDocument {
            id: "srv-9".to_string(),
            filename: "r.pdf".to_string(),
            file_type: None,
            size: None,
            processed_data: None,
            extracted_text: Some("text".to_string()),
            confidence_score: None,
            status: None,
        };
        let doc = NewDocument::from_remote(&remote, Utc::now());
        assert_eq!(doc.sync_status, SyncState::Synced);
        assert_eq!(doc.server_id.as_deref(), Some("srv-9"));
        assert_eq!(doc.status, "completed");
    }

    #[test]
    fn test_upload_report_counts() {
        let mut report = UploadReport::default();
        report.push(UploadOutcome {
            document_id: 1,
            filename: "a".into(),
            server_id: Some("s".into()),
            error: None,
        });
        report.push(UploadOutcome {
            document_id: 2,
            filename: "b".into(),
            server_id: None,
            error: Some("boom".into()),
        });
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = SyncStatus {
            pending_uploads: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["pendingUploads"], 2);
        assert_eq!(value["isOnline"], false);
    }

    #[test]
    fn test_export_bundle_keeps_null_server() {
        let bundle = ExportBundle {
            local: LocalBundle {
                version: crate::BUNDLE_VERSION,
                exported_at: Utc::now(),
                documents: vec![sample_document()],
                sync_logs: vec![],
                settings: BTreeMap::new(),
            },
            server: None,
        };
        let value = serde_json::to_value(&bundle).unwrap();
        assert!(value["server"].is_null());
        assert_eq!(value["local"]["documents"][0]["filename"], "a.pdf");
    }
}
