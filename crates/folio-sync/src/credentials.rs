//! # Credential Store
//!
//! Owns the bearer token and the cached user profile, and gates every
//! authenticated call.
//!
//! ## Credential Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Credential Lifecycle                               │
//! │                                                                         │
//! │  login(email, pw) ──► POST /auth/login ──► {token, user}               │
//! │                                              │                          │
//! │                          settings: auth_token + auth_user (one tx)     │
//! │                          users:    upsert cached profile               │
//! │                                                                         │
//! │  valid_token() ──► exp within 5 min? ──► POST /auth/refresh            │
//! │                                  │                 │                    │
//! │                                  no                fails ⇒ old token   │
//! │                                  ▼                                      │
//! │                            stored token                                │
//! │                                                                         │
//! │  logout() ──► POST /auth/logout (best effort, online only)             │
//! │           ──► delete auth_token + auth_user (always)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Token Storage
//! Tokens live in the `settings` table and are mirrored in memory. A missing
//! or empty token means unauthenticated; no network call is made to find out.

use chrono::Utc;
use folio_core::validation::{validate_email, validate_password};
use folio_core::{Credential, SETTING_AUTH_TOKEN, SETTING_AUTH_USER};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;
use crate::store::LocalStore;

/// Margin before token expiration to trigger refresh (5 minutes)
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Reads the `exp` claim of a JWT without checking its signature.
///
/// Returns `None` for opaque (non-JWT) tokens.
pub fn token_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.exp)
}

/// Bearer token and user profile, persisted in local settings.
pub struct CredentialStore {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    connectivity: Arc<ConnectivityMonitor>,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Creates a store and loads any persisted credential.
    pub async fn load(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> SyncResult<Self> {
        let token = store
            .get_setting(SETTING_AUTH_TOKEN)
            .await?
            .filter(|t| !t.is_empty());

        let current = match token {
            Some(token) => {
                let user = store
                    .get_setting(SETTING_AUTH_USER)
                    .await?
                    .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                    .filter(|v| !v.is_null());
                debug!("Loaded stored credential");
                Some(Credential { token, user })
            }
            None => None,
        };

        Ok(CredentialStore {
            store,
            remote,
            connectivity,
            current: RwLock::new(current),
        })
    }

    /// Logs in and persists the returned token and user.
    pub async fn login(&self, email: &str, password: &str) -> SyncResult<Credential> {
        validate_email(email)?;
        validate_password(password)?;

        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let response = self.remote.login(email.trim(), password).await?;
        if response.token.is_empty() {
            return Err(SyncError::RemoteRejected {
                status: 200,
                message: "login response carried an empty token".to_string(),
            });
        }

        let user_json = serde_json::to_string(&response.user.clone().unwrap_or(Value::Null))?;
        self.store
            .set_settings(&[
                (SETTING_AUTH_TOKEN, response.token.as_str()),
                (SETTING_AUTH_USER, user_json.as_str()),
            ])
            .await?;

        if let Some(user) = &response.user {
            if let Err(e) = self.store.upsert_user(user).await {
                warn!(error = %e, "Failed to cache user profile");
            }
        }

        let credential = Credential {
            token: response.token,
            user: response.user,
        };
        *self.current.write().await = Some(credential.clone());

        info!(email = %email.trim(), "Logged in");
        Ok(credential)
    }

    /// Notifies the server when possible, then clears local credentials.
    ///
    /// The local token is cleared even when the server call fails.
    pub async fn logout(&self) -> SyncResult<()> {
        let token = self.current.write().await.take().map(|c| c.token);

        if let Some(token) = token {
            if self.connectivity.is_online() {
                if let Err(e) = self.remote.logout(&token).await {
                    warn!(error = %e, "Server logout failed, clearing local credentials anyway");
                }
            } else {
                debug!("Offline, skipping server logout");
            }
        }

        self.store
            .delete_settings(&[SETTING_AUTH_TOKEN, SETTING_AUTH_USER])
            .await?;

        info!("Logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| !c.token.is_empty())
            .unwrap_or(false)
    }

    /// Returns the stored token. Local check only.
    pub async fn auth_token(&self) -> SyncResult<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| c.token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(SyncError::Unauthenticated)
    }

    /// Returns the cached user profile, if any.
    pub async fn user(&self) -> Option<Value> {
        self.current.read().await.as_ref().and_then(|c| c.user.clone())
    }

    /// Attempts a silent reissue. Failure is routine and returns false.
    pub async fn refresh_token(&self) -> bool {
        let token = match self.auth_token().await {
            Ok(token) => token,
            Err(_) => return false,
        };

        if !self.connectivity.is_online() {
            debug!("Offline, skipping token refresh");
            return false;
        }

        let new_token = match self.remote.refresh(&token).await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => {
                warn!("Token refresh returned an empty token");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        if let Err(e) = self
            .store
            .set_settings(&[(SETTING_AUTH_TOKEN, new_token.as_str())])
            .await
        {
            warn!(error = %e, "Failed to persist refreshed token");
            return false;
        }

        if let Some(current) = self.current.write().await.as_mut() {
            current.token = new_token;
        }
        info!("Token refreshed");
        true
    }

    /// Returns a token for an authenticated call, refreshing it first when
    /// it expires within the refresh margin.
    pub async fn valid_token(&self) -> SyncResult<String> {
        let token = self.auth_token().await?;

        let expires_soon = token_expiry(&token)
            .map(|exp| exp - Utc::now().timestamp() <= REFRESH_MARGIN_SECS)
            .unwrap_or(false);
        if !expires_soon {
            return Ok(token);
        }

        debug!("Token near expiry, attempting refresh");
        if self.refresh_token().await {
            return self.auth_token().await;
        }
        Ok(token)
    }
}
