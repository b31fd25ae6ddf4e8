//! # Document Repository
//!
//! Documents and their sync bookkeeping.
//!
//! ## Sync Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync_status   server_id   last_sync    meaning                        │
//! │  ───────────   ─────────   ─────────    ─────────────────────────────  │
//! │  pending       NULL/old    any          needs upload                    │
//! │  synced        set         set          confirmed by server             │
//! │  failed        NULL/old    any          retries exhausted, audit logged │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `mark_synced` is the only way a row reaches `synced` from the upload path,
//! and it always sets `server_id` in the same statement.

use chrono::{DateTime, Utc};
use folio_core::{Document, DocumentId, DocumentPatch, NewDocument, NewSyncLog, SyncLog, SyncState};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::sync_log;

const SELECT_DOCUMENT: &str = r#"
    SELECT
        id, filename, file_path, file_type, file_size, processed_data,
        extracted_text, confidence_score, status, sync_status, server_id,
        last_sync, created_at, updated_at
    FROM documents
"#;

/// Raw row; `processed_data` is stored as JSON text.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: i64,
    filename: String,
    file_path: Option<String>,
    file_type: Option<String>,
    file_size: Option<i64>,
    processed_data: Option<String>,
    extracted_text: Option<String>,
    confidence_score: Option<f64>,
    status: String,
    sync_status: SyncState,
    server_id: Option<String>,
    last_sync: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> DbResult<Self> {
        let processed_data = row
            .processed_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DbError::invalid_json("documents.processed_data", e))?;

        Ok(Document {
            id: row.id,
            filename: row.filename,
            file_path: row.file_path,
            file_type: row.file_type,
            file_size: row.file_size,
            processed_data,
            extracted_text: row.extracted_text,
            confidence_score: row.confidence_score,
            status: row.status,
            sync_status: row.sync_status,
            server_id: row.server_id,
            last_sync: row.last_sync,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_json(value: &Option<serde_json::Value>) -> DbResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::invalid_json("documents.processed_data", e))
}

fn collect(rows: Vec<DocumentRow>) -> DbResult<Vec<Document>> {
    rows.into_iter().map(Document::try_from).collect()
}

/// Repository for document operations.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Creates a new DocumentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a document by local id.
    pub async fn get(&self, id: DocumentId) -> DbResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!("{SELECT_DOCUMENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Document::try_from).transpose()
    }

    /// Gets a document by local id, failing with `NotFound` if absent.
    pub async fn require(&self, id: DocumentId) -> DbResult<Document> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))
    }

    /// Finds the oldest document with the given filename.
    pub async fn find_by_filename(&self, filename: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_DOCUMENT} WHERE filename = ?1 ORDER BY id ASC LIMIT 1"
        ))
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    /// Finds the document the server knows under `server_id`.
    pub async fn find_by_server_id(&self, server_id: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_DOCUMENT} WHERE server_id = ?1 ORDER BY id ASC LIMIT 1"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    /// Lists documents not yet confirmed by the server, oldest first.
    pub async fn list_dirty(&self) -> DbResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_DOCUMENT} WHERE sync_status != 'synced' ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    /// Lists every document, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!("{SELECT_DOCUMENT} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        collect(rows)
    }

    /// Counts documents not yet confirmed by the server.
    pub async fn count_dirty(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE sync_status != 'synced'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a new document and returns it with its assigned id.
    pub async fn insert(&self, doc: &NewDocument) -> DbResult<Document> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_with(&mut conn, doc).await?;
        drop(conn);
        self.require(id).await
    }

    /// Applies a whole-record update from the server.
    ///
    /// `sync_status` and `server_id` are left untouched.
    pub async fn apply_patch(&self, id: DocumentId, patch: &DocumentPatch) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        patch_with(&mut conn, id, patch).await
    }

    /// Marks a document as synced under `server_id`.
    pub async fn mark_synced(
        &self,
        id: DocumentId,
        server_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(document_id = id, server_id = %server_id, "Marking document synced");

        let result = sqlx::query(
            r#"
            UPDATE documents SET
                sync_status = 'synced',
                server_id = ?2,
                last_sync = ?3,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(server_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Document", id));
        }
        Ok(())
    }

    /// Marks a document as pending (manual resync, re-import).
    pub async fn mark_pending(&self, id: DocumentId) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_state_with(&mut conn, id, SyncState::Pending).await
    }

    /// Marks a document as failed and appends its audit entry in one
    /// transaction. Either both land or neither does.
    pub async fn fail_with_log(&self, id: DocumentId, entry: &NewSyncLog) -> DbResult<SyncLog> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        set_state_with(&mut *tx, id, SyncState::Failed).await?;
        let log = sync_log::unresolved(entry);
        sync_log::insert_with(&mut *tx, &log).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(log)
    }
}

// =============================================================================
// Connection-level helpers (shared with backup import transactions)
// =============================================================================

pub(crate) async fn insert_with(conn: &mut SqliteConnection, doc: &NewDocument) -> DbResult<DocumentId> {
    let now = Utc::now();
    let processed_data = encode_json(&doc.processed_data)?;

    debug!(filename = %doc.filename, sync_status = %doc.sync_status, "Inserting document");

    let result = sqlx::query(
        r#"
        INSERT INTO documents (
            filename, file_path, file_type, file_size, processed_data,
            extracted_text, confidence_score, status, sync_status, server_id,
            last_sync, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        "#,
    )
    .bind(&doc.filename)
    .bind(&doc.file_path)
    .bind(&doc.file_type)
    .bind(doc.file_size)
    .bind(processed_data)
    .bind(&doc.extracted_text)
    .bind(doc.confidence_score)
    .bind(&doc.status)
    .bind(doc.sync_status)
    .bind(&doc.server_id)
    .bind(doc.last_sync)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn set_state_with(conn: &mut SqliteConnection, id: DocumentId, state: SyncState) -> DbResult<()> {
    debug!(document_id = id, state = %state, "Updating sync state");

    let result = sqlx::query("UPDATE documents SET sync_status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(state)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Document", id));
    }
    Ok(())
}

pub(crate) async fn patch_with(
    conn: &mut SqliteConnection,
    id: DocumentId,
    patch: &DocumentPatch,
) -> DbResult<()> {
    let processed_data = encode_json(&patch.processed_data)?;

    let result = sqlx::query(
        r#"
        UPDATE documents SET
            processed_data = ?2,
            extracted_text = ?3,
            confidence_score = ?4,
            status = ?5,
            last_sync = ?6,
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(processed_data)
    .bind(&patch.extracted_text)
    .bind(patch.confidence_score)
    .bind(&patch.status)
    .bind(patch.last_sync)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Document", id));
    }
    Ok(())
}
