//! # User Repository
//!
//! Cached user profiles returned by the login endpoint. The profile is kept
//! verbatim as JSON; `email` and `name` are lifted into columns for lookup.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Repository for cached user profiles.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts or replaces a user profile.
    ///
    /// The key is the profile's `id` (string or number), falling back to
    /// `email`. Profiles with neither are skipped.
    ///
    /// ## Returns
    /// The key the profile was stored under, if any.
    pub async fn upsert(&self, profile: &Value) -> DbResult<Option<String>> {
        let Some(id) = profile_key(profile) else {
            warn!("User profile has no id or email, not caching");
            return Ok(None);
        };

        let email = profile.get("email").and_then(Value::as_str);
        let name = profile.get("name").and_then(Value::as_str);
        let encoded =
            serde_json::to_string(profile).map_err(|e| DbError::invalid_json("users.profile", e))?;

        debug!(user_id = %id, "Caching user profile");

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, profile, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                profile = excluded.profile,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(name)
        .bind(encoded)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Some(id))
    }

    /// Gets a cached profile by key.
    pub async fn get(&self, id: &str) -> DbResult<Option<Value>> {
        let profile: Option<String> = sqlx::query_scalar("SELECT profile FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        profile
            .map(|p| serde_json::from_str(&p).map_err(|e| DbError::invalid_json("users.profile", e)))
            .transpose()
    }
}

fn profile_key(profile: &Value) -> Option<String> {
    match profile.get("id") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Number(n)) => return Some(n.to_string()),
        _ => {}
    }
    profile
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_by_id_and_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();

        let key = users
            .upsert(&json!({"id": 7, "email": "a@b.c", "name": "Ada"}))
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some("7"));

        users
            .upsert(&json!({"id": 7, "email": "a@b.c", "name": "Ada L."}))
            .await
            .unwrap();
        assert_eq!(users.get("7").await.unwrap().unwrap()["name"], "Ada L.");

        let key = users.upsert(&json!({"email": "x@y.z"})).await.unwrap();
        assert_eq!(key.as_deref(), Some("x@y.z"));

        assert_eq!(users.upsert(&json!({"name": "anon"})).await.unwrap(), None);
    }
}
