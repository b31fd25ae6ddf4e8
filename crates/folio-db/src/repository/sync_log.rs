//! # Sync Log Repository
//!
//! Append-only audit of terminal sync failures.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Queue item fails for the Nth time (N = max_retries)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  documents().fail_with_log(id, NewSyncLog { kind, record_id, .. })     │
//! │       │   record failed + entry with resolved = 0, one transaction      │
//! │       ▼                                                                 │
//! │  count_pending() → failedSyncLogs in the status snapshot               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Manual resync → resolve_for_record(table, id) sets resolved = 1       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are never updated except for the `resolved` flag and never deleted.

use chrono::{DateTime, Utc};
use folio_core::{NewSyncLog, SyncLog};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct SyncLogRow {
    id: String,
    kind: String,
    table_name: String,
    record_id: String,
    payload: String,
    resolved: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<SyncLogRow> for SyncLog {
    type Error = DbError;

    fn try_from(row: SyncLogRow) -> DbResult<Self> {
        let payload = serde_json::from_str(&row.payload)
            .map_err(|e| DbError::invalid_json("sync_logs.payload", e))?;

        Ok(SyncLog {
            id: row.id,
            kind: row.kind,
            table_name: row.table_name,
            record_id: row.record_id,
            payload,
            resolved: row.resolved,
            created_at: row.created_at,
        })
    }
}

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }


    /// Lists unresolved entries, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<SyncLog>> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            r#"
            SELECT id, kind, table_name, record_id, payload, resolved, created_at
            FROM sync_logs
            WHERE resolved = 0
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncLog::try_from).collect()
    }

    /// Lists every entry, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<SyncLog>> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            r#"
            SELECT id, kind, table_name, record_id, payload, resolved, created_at
            FROM sync_logs
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncLog::try_from).collect()
    }

    /// Counts unresolved entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_logs WHERE resolved = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Marks every unresolved entry for one record as resolved.
    ///
    /// ## Returns
    /// Number of entries resolved.
    pub async fn resolve_for_record(&self, table_name: &str, record_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE sync_logs SET resolved = 1 WHERE table_name = ?1 AND record_id = ?2 AND resolved = 0",
        )
        .bind(table_name)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Builds a fresh unresolved entry with a new id.
pub(crate) fn unresolved(entry: &NewSyncLog) -> SyncLog {
    let log = SyncLog {
        id: Uuid::new_v4().to_string(),
        kind: entry.kind.clone(),
        table_name: entry.table_name.clone(),
        record_id: entry.record_id.clone(),
        payload: entry.payload.clone(),
        resolved: false,
        created_at: Utc::now(),
    };

    debug!(
        kind = %log.kind,
        table = %log.table_name,
        record_id = %log.record_id,
        "Appending sync log entry"
    );
    log
}

/// Inserts a complete entry, keeping its id (backup restore).
///
/// Existing ids are left alone so a bundle can be imported twice.
pub(crate) async fn insert_with(conn: &mut SqliteConnection, log: &SyncLog) -> DbResult<bool> {
    let payload =
        serde_json::to_string(&log.payload).map_err(|e| DbError::invalid_json("sync_logs.payload", e))?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO sync_logs (id, kind, table_name, record_id, payload, resolved, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&log.id)
    .bind(&log.kind)
    .bind(&log.table_name)
    .bind(&log.record_id)
    .bind(payload)
    .bind(log.resolved)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use folio_core::NewDocument;
    use serde_json::json;

    /// Inserts a document and fails it, returning its id as stored in the log.
    async fn failed_document(db: &Database, filename: &str) -> (String, SyncLog) {
        let doc = db.documents().insert(&NewDocument::pending(filename)).await.unwrap();
        let entry = NewSyncLog {
            kind: "upload_failed".to_string(),
            table_name: "documents".to_string(),
            record_id: doc.id.to_string(),
            payload: json!({"error": "HTTP 500"}),
        };
        let log = db.documents().fail_with_log(doc.id, &entry).await.unwrap();
        (doc.id.to_string(), log)
    }

    #[tokio::test]
    async fn test_add_and_count() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_logs();

        let (_, log) = failed_document(&db, "a.pdf").await;
        failed_document(&db, "b.pdf").await;

        assert!(!log.resolved);
        assert_eq!(repo.count_pending().await.unwrap(), 2);

        let pending = repo.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload["error"], "HTTP 500");
    }

    #[tokio::test]
    async fn test_resolve_for_record() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_logs();

        let (first, _) = failed_document(&db, "a.pdf").await;
        failed_document(&db, "b.pdf").await;

        assert_eq!(repo.resolve_for_record("documents", &first).await.unwrap(), 1);
        assert_eq!(repo.resolve_for_record("documents", &first).await.unwrap(), 0);
        assert_eq!(repo.count_pending().await.unwrap(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }
}
