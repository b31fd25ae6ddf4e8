//! # Backup Export / Import
//!
//! Produces and restores a [`LocalBundle`]: every document, every audit log
//! entry and the non-credential settings.
//!
//! ## Import Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  documents  → upsert by filename (natural key)                         │
//! │               existing: whole-record update of the processed fields    │
//! │               missing:  insert with the bundle's sync state            │
//! │  sync_logs  → insert by id, existing ids ignored                       │
//! │  settings   → upsert, credential keys never restored                   │
//! │                                                                         │
//! │  All of it runs in ONE transaction.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use folio_core::{
    Document, DocumentId, DocumentPatch, LocalBundle, NewDocument, BUNDLE_VERSION,
    SETTING_AUTH_TOKEN, SETTING_AUTH_USER,
};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{document, settings, sync_log};

/// Settings keys that never leave or enter the store through a bundle.
const CREDENTIAL_KEYS: [&str; 2] = [SETTING_AUTH_TOKEN, SETTING_AUTH_USER];

/// What `import_local` changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    /// Local ids of newly inserted documents.
    pub inserted: Vec<DocumentId>,
    /// Local ids of documents updated in place.
    pub updated: Vec<DocumentId>,
    pub sync_logs_restored: u32,
    pub settings_restored: u32,
}

impl ImportOutcome {
    /// Every document id touched by the import, in bundle order.
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.inserted.iter().chain(self.updated.iter()).copied().collect()
    }
}

/// Exports the local store.
pub async fn export_local(db: &Database) -> DbResult<LocalBundle> {
    let documents = db.documents().list_all().await?;
    let sync_logs = db.sync_logs().list_all().await?;
    let mut settings = db.settings().all().await?;
    settings.retain(|key, _| !CREDENTIAL_KEYS.contains(&key.as_str()));

    info!(
        documents = documents.len(),
        sync_logs = sync_logs.len(),
        settings = settings.len(),
        "Exported local bundle"
    );

    Ok(LocalBundle {
        version: BUNDLE_VERSION,
        exported_at: Utc::now(),
        documents,
        sync_logs,
        settings,
    })
}

/// Applies a bundle to the local store in one transaction.
pub async fn import_local(db: &Database, bundle: &LocalBundle) -> DbResult<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    let now = Utc::now();

    let mut tx = db
        .pool()
        .begin()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    for doc in &bundle.documents {
        let existing: Option<DocumentId> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE filename = ?1 ORDER BY id ASC LIMIT 1",
        )
        .bind(&doc.filename)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(id) => {
                document::patch_with(&mut *tx, id, &patch_from(doc, now)).await?;
                outcome.updated.push(id);
            }
            None => {
                let id = document::insert_with(&mut *tx, &new_from(doc)).await?;
                outcome.inserted.push(id);
            }
        }
    }

    for log in &bundle.sync_logs {
        if sync_log::insert_with(&mut *tx, log).await? {
            outcome.sync_logs_restored += 1;
        }
    }

    for (key, value) in &bundle.settings {
        if CREDENTIAL_KEYS.contains(&key.as_str()) {
            continue;
        }
        settings::set_with(&mut *tx, key, value).await?;
        outcome.settings_restored += 1;
    }

    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    info!(
        inserted = outcome.inserted.len(),
        updated = outcome.updated.len(),
        sync_logs = outcome.sync_logs_restored,
        settings = outcome.settings_restored,
        "Imported local bundle"
    );

    Ok(outcome)
}

fn patch_from(doc: &Document, now: chrono::DateTime<Utc>) -> DocumentPatch {
    DocumentPatch {
        processed_data: doc.processed_data.clone(),
        extracted_text: doc.extracted_text.clone(),
        confidence_score: doc.confidence_score,
        status: doc.status.clone(),
        last_sync: doc.last_sync.unwrap_or(now),
    }
}

fn new_from(doc: &Document) -> NewDocument {
    NewDocument {
        filename: doc.filename.clone(),
        file_path: doc.file_path.clone(),
        file_type: doc.file_type.clone(),
        file_size: doc.file_size,
        processed_data: doc.processed_data.clone(),
        extracted_text: doc.extracted_text.clone(),
        confidence_score: doc.confidence_score,
        status: doc.status.clone(),
        sync_status: doc.sync_status,
        server_id: doc.server_id.clone(),
        last_sync: doc.last_sync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use folio_core::{NewSyncLog, SyncState};
    use serde_json::json;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let doc = db.documents().insert(&NewDocument::pending("a.pdf")).await.unwrap();
        db.documents().mark_synced(doc.id, "srv-1", Utc::now()).await.unwrap();
        let failed = db.documents().insert(&NewDocument::pending("b.pdf")).await.unwrap();
        let entry = NewSyncLog {
            kind: "upload_failed".into(),
            table_name: "documents".into(),
            record_id: failed.id.to_string(),
            payload: json!({}),
        };
        db.documents().fail_with_log(failed.id, &entry).await.unwrap();
        db.settings()
            .set_many(&[
                (SETTING_AUTH_TOKEN, "secret"),
                (SETTING_AUTH_USER, "{}"),
                ("last_sync", "cursor-1"),
            ])
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_export_excludes_credentials() {
        let db = seeded().await;
        let bundle = export_local(&db).await.unwrap();

        assert_eq!(bundle.version, BUNDLE_VERSION);
        assert_eq!(bundle.documents.len(), 2);
        assert_eq!(bundle.sync_logs.len(), 1);
        assert_eq!(bundle.settings.len(), 1);
        assert!(!bundle.settings.contains_key(SETTING_AUTH_TOKEN));
    }

    #[tokio::test]
    async fn test_import_into_empty_store() {
        let bundle = export_local(&seeded().await).await.unwrap();

        let target = Database::new(DbConfig::in_memory()).await.unwrap();
        let outcome = import_local(&target, &bundle).await.unwrap();

        assert_eq!(outcome.inserted.len(), 2);
        assert!(outcome.updated.is_empty());
        assert_eq!(outcome.sync_logs_restored, 1);
        assert_eq!(outcome.settings_restored, 1);

        let a = target.documents().find_by_filename("a.pdf").await.unwrap().unwrap();
        assert_eq!(a.sync_status, SyncState::Synced);
        assert_eq!(a.server_id.as_deref(), Some("srv-1"));
        assert_eq!(target.settings().get(SETTING_AUTH_TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_import_twice_upserts_by_filename() {
        let db = seeded().await;
        let bundle = export_local(&db).await.unwrap();

        let outcome = import_local(&db, &bundle).await.unwrap();

        assert!(outcome.inserted.is_empty());
        assert_eq!(outcome.updated.len(), 2);
        assert_eq!(outcome.sync_logs_restored, 0);
        assert_eq!(outcome.document_ids().len(), 2);
        assert_eq!(db.documents().list_all().await.unwrap().len(), 2);
        assert_eq!(db.sync_logs().list_all().await.unwrap().len(), 1);
    }
}
