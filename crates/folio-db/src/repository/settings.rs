//! # Settings Repository
//!
//! Key/value settings: the bearer token, cached user profile and the
//! download high-water mark all live here.
//!
//! Multi-key writes (`set_many`, `delete_many`) run in one transaction so a
//! login never leaves a token without its user.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for key/value settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Gets a setting value.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Sets (upserts) a setting value.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_with(&mut conn, key, value).await
    }

    /// Deletes a setting. Missing keys are not an error.
    pub async fn delete(&self, key: &str) -> DbResult<()> {
        debug!(key = %key, "Deleting setting");

        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Sets several values atomically.
    pub async fn set_many(&self, entries: &[(&str, &str)]) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for (key, value) in entries {
            set_with(&mut *tx, key, value).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Deletes several keys atomically.
    pub async fn delete_many(&self, keys: &[&str]) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for key in keys {
            sqlx::query("DELETE FROM settings WHERE key = ?1")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Returns every setting, ordered by key.
    pub async fn all(&self) -> DbResult<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}

pub(crate) async fn set_with(conn: &mut SqliteConnection, key: &str, value: &str) -> DbResult<()> {
    debug!(key = %key, "Writing setting");

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_get_set_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        assert_eq!(settings.get("last_sync").await.unwrap(), None);

        settings.set("last_sync", "2024-01-01").await.unwrap();
        settings.set("last_sync", "2024-02-01").await.unwrap();
        assert_eq!(
            settings.get("last_sync").await.unwrap().as_deref(),
            Some("2024-02-01")
        );

        settings.delete("last_sync").await.unwrap();
        settings.delete("last_sync").await.unwrap();
        assert_eq!(settings.get("last_sync").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_key_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        settings
            .set_many(&[("auth_token", "tok"), ("auth_user", "{}")])
            .await
            .unwrap();
        assert_eq!(settings.all().await.unwrap().len(), 2);

        settings.delete_many(&["auth_token", "auth_user"]).await.unwrap();
        assert!(settings.all().await.unwrap().is_empty());
    }
}
