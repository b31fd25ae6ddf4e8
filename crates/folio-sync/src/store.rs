//! # Local Store Capability
//!
//! Everything the sync engine needs from local persistence, as one trait.
//! [`folio_db::Database`] is the production implementation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reconciler / SyncEngine / CredentialStore / StatusReporter            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Arc<dyn LocalStore>                                                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  folio_db::Database ── documents / sync_logs / settings / users        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use folio_core::{
    Document, DocumentId, DocumentPatch, LocalBundle, NewDocument, NewSyncLog, SyncLog,
};
use folio_db::backup::{self, ImportOutcome};
use folio_db::Database;
use serde_json::Value;

use crate::error::SyncResult;

/// Local persistence used by the sync engine.
#[async_trait]
pub trait LocalStore: Send + Sync {
    // Documents
    async fn dirty_documents(&self) -> SyncResult<Vec<Document>>;
    async fn count_dirty(&self) -> SyncResult<i64>;
    async fn get_document(&self, id: DocumentId) -> SyncResult<Option<Document>>;
    async fn find_by_filename(&self, filename: &str) -> SyncResult<Option<Document>>;
    async fn find_by_server_id(&self, server_id: &str) -> SyncResult<Option<Document>>;
    async fn insert_document(&self, doc: &NewDocument) -> SyncResult<Document>;
    async fn update_document(&self, id: DocumentId, patch: &DocumentPatch) -> SyncResult<()>;
    async fn mark_synced(&self, id: DocumentId, server_id: &str) -> SyncResult<()>;
    async fn mark_pending(&self, id: DocumentId) -> SyncResult<()>;

    // Audit log
    /// Marks the document failed and appends its audit entry, atomically.
    async fn fail_document(&self, id: DocumentId, entry: &NewSyncLog) -> SyncResult<SyncLog>;
    async fn pending_sync_logs(&self) -> SyncResult<Vec<SyncLog>>;
    async fn count_pending_sync_logs(&self) -> SyncResult<i64>;
    async fn resolve_sync_logs(&self, table_name: &str, record_id: &str) -> SyncResult<u64>;

    // Settings
    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>>;
    /// Writes every pair or none.
    async fn set_settings(&self, entries: &[(&str, &str)]) -> SyncResult<()>;
    /// Deletes every key or none.
    async fn delete_settings(&self, keys: &[&str]) -> SyncResult<()>;

    // Users
    async fn upsert_user(&self, profile: &Value) -> SyncResult<()>;

    // Backup
    async fn export_local(&self) -> SyncResult<LocalBundle>;
    async fn import_local(&self, bundle: &LocalBundle) -> SyncResult<ImportOutcome>;
}

#[async_trait]
impl LocalStore for Database {
    async fn dirty_documents(&self) -> SyncResult<Vec<Document>> {
        Ok(self.documents().list_dirty().await?)
    }

    async fn count_dirty(&self) -> SyncResult<i64> {
        Ok(self.documents().count_dirty().await?)
    }

    async fn get_document(&self, id: DocumentId) -> SyncResult<Option<Document>> {
        Ok(self.documents().get(id).await?)
    }

    async fn find_by_filename(&self, filename: &str) -> SyncResult<Option<Document>> {
        Ok(self.documents().find_by_filename(filename).await?)
    }

    async fn find_by_server_id(&self, server_id: &str) -> SyncResult<Option<Document>> {
        Ok(self.documents().find_by_server_id(server_id).await?)
    }

    async fn insert_document(&self, doc: &NewDocument) -> SyncResult<Document> {
        Ok(self.documents().insert(doc).await?)
    }

    async fn update_document(&self, id: DocumentId, patch: &DocumentPatch) -> SyncResult<()> {
        Ok(self.documents().apply_patch(id, patch).await?)
    }

    async fn mark_synced(&self, id: DocumentId, server_id: &str) -> SyncResult<()> {
        Ok(self.documents().mark_synced(id, server_id, Utc::now()).await?)
    }

    async fn mark_pending(&self, id: DocumentId) -> SyncResult<()> {
        Ok(self.documents().mark_pending(id).await?)
    }

    async fn fail_document(&self, id: DocumentId, entry: &NewSyncLog) -> SyncResult<SyncLog> {
        Ok(self.documents().fail_with_log(id, entry).await?)
    }

    async fn pending_sync_logs(&self) -> SyncResult<Vec<SyncLog>> {
        Ok(self.sync_logs().list_pending().await?)
    }

    async fn count_pending_sync_logs(&self) -> SyncResult<i64> {
        Ok(self.sync_logs().count_pending().await?)
    }

    async fn resolve_sync_logs(&self, table_name: &str, record_id: &str) -> SyncResult<u64> {
        Ok(self.sync_logs().resolve_for_record(table_name, record_id).await?)
    }

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.settings().get(key).await?)
    }

    async fn set_settings(&self, entries: &[(&str, &str)]) -> SyncResult<()> {
        Ok(self.settings().set_many(entries).await?)
    }

    async fn delete_settings(&self, keys: &[&str]) -> SyncResult<()> {
        Ok(self.settings().delete_many(keys).await?)
    }

    async fn upsert_user(&self, profile: &Value) -> SyncResult<()> {
        self.users().upsert(profile).await?;
        Ok(())
    }

    async fn export_local(&self) -> SyncResult<LocalBundle> {
        Ok(backup::export_local(self).await?)
    }

    async fn import_local(&self, bundle: &LocalBundle) -> SyncResult<ImportOutcome> {
        Ok(backup::import_local(self, bundle).await?)
    }
}
