//! # Remote API
//!
//! The remote document server, as a capability trait plus the production
//! HTTP client.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Method & Path                         Auth     Timeout                 │
//! │  ────────────────────────────────────  ──────   ───────                 │
//! │  GET  /health                          none     probe  (5 s)            │
//! │  POST /auth/login     {email,password} none     request (30 s)          │
//! │  POST /auth/logout                     bearer   request                 │
//! │  POST /auth/refresh   → {token}        bearer   request                 │
//! │  POST /documents/upload (multipart)    bearer   request                 │
//! │       file = raw bytes, data = JSON sidecar → {id}                      │
//! │  GET  /documents/sync?since=<mark>     bearer   request                 │
//! │       → {documents[], lastSync}                                         │
//! │  GET  /sync/status                     bearer   status (5 s)            │
//! │  GET  /data/export                     bearer   request                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Mapping
//! - timeout → `NetworkTimeout(secs)`
//! - connect / DNS / reset → `Network`
//! - non-2xx → `RemoteRejected { status, message }`

use async_trait::async_trait;
use folio_core::{deserialize_id, DownloadBatch, LoginResponse, UploadMetadata};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Capability
// =============================================================================

/// Raw file content attached to an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One multipart upload: the JSON sidecar plus the file, when it exists.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    pub metadata: UploadMetadata,
    pub file: Option<FilePart>,
}

/// Calls to the remote document server.
///
/// Implementations never check connectivity or credentials; callers do.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `GET /health`. Ok only on 2xx.
    async fn health(&self) -> SyncResult<()>;

    async fn login(&self, email: &str, password: &str) -> SyncResult<LoginResponse>;

    async fn logout(&self, token: &str) -> SyncResult<()>;

    /// Returns the reissued token.
    async fn refresh(&self, token: &str) -> SyncResult<String>;

    /// Returns the server-assigned id.
    async fn upload_document(&self, token: &str, upload: &DocumentUpload) -> SyncResult<String>;

    async fn fetch_changes(&self, token: &str, since: Option<&str>) -> SyncResult<DownloadBatch>;

    async fn sync_status(&self, token: &str) -> SyncResult<Value>;

    async fn export_data(&self, token: &str) -> SyncResult<Value>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// `reqwest` client for the remote document server.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    status_timeout: Duration,
}

impl HttpRemote {
    /// Creates a client from the `[remote]` settings.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        url::Url::parse(&config.remote.base_url)?;

        let client = Client::builder()
            .connect_timeout(config.probe_timeout())
            .user_agent(concat!("folio-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpRemote {
            client,
            base_url: config.remote.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            probe_timeout: config.probe_timeout(),
            status_timeout: config.status_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends with a deadline and maps transport errors and non-2xx.
    async fn send(&self, request: RequestBuilder, timeout: Duration) -> SyncResult<Response> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, timeout.as_secs()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::RemoteRejected {
            status: status.as_u16(),
            message: rejection_message(&body, status.canonical_reason()),
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
        timeout: Duration,
    ) -> SyncResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::from_reqwest(e, timeout.as_secs()))
    }
}

/// Pulls `message` or `error` out of a JSON error body, else the raw text.
fn rejection_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        reason.unwrap_or("request rejected").to_string()
    } else {
        body.trim().to_string()
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn health(&self) -> SyncResult<()> {
        self.send(self.client.get(self.url("/health")), self.probe_timeout)
            .await?;
        Ok(())
    }

    async fn login(&self, email: &str, password: &str) -> SyncResult<LoginResponse> {
        debug!(email = %email, "POST /auth/login");
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        let response = self.send(request, self.request_timeout).await?;
        self.json(response, self.request_timeout).await
    }

    async fn logout(&self, token: &str) -> SyncResult<()> {
        let request = self.client.post(self.url("/auth/logout")).bearer_auth(token);
        self.send(request, self.request_timeout).await?;
        Ok(())
    }

    async fn refresh(&self, token: &str) -> SyncResult<String> {
        let request = self.client.post(self.url("/auth/refresh")).bearer_auth(token);
        let response = self.send(request, self.request_timeout).await?;
        let body: RefreshResponse = self.json(response, self.request_timeout).await?;
        Ok(body.token)
    }

    async fn upload_document(&self, token: &str, upload: &DocumentUpload) -> SyncResult<String> {
        let data = serde_json::to_string(&upload.metadata)?;
        let mut form = Form::new().text("data", data);

        if let Some(file) = &upload.file {
            let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            let part = match &file.mime_type {
                Some(mime) => part.mime_str(mime).map_err(|e| {
                    SyncError::Validation(format!("Invalid MIME type '{}': {}", mime, e))
                })?,
                None => part,
            };
            form = form.part("file", part);
        }

        debug!(
            document_id = upload.metadata.id,
            filename = %upload.metadata.filename,
            with_file = upload.file.is_some(),
            "POST /documents/upload"
        );

        let request = self
            .client
            .post(self.url("/documents/upload"))
            .bearer_auth(token)
            .multipart(form);
        let response = self.send(request, self.request_timeout).await?;
        let body: UploadResponse = self.json(response, self.request_timeout).await?;
        Ok(body.id)
    }

    async fn fetch_changes(&self, token: &str, since: Option<&str>) -> SyncResult<DownloadBatch> {
        let mut request = self
            .client
            .get(self.url("/documents/sync"))
            .bearer_auth(token);
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }

        debug!(since = ?since, "GET /documents/sync");
        let response = self.send(request, self.request_timeout).await?;
        self.json(response, self.request_timeout).await
    }

    async fn sync_status(&self, token: &str) -> SyncResult<Value> {
        let request = self.client.get(self.url("/sync/status")).bearer_auth(token);
        let response = self.send(request, self.status_timeout).await?;
        self.json(response, self.status_timeout).await
    }

    async fn export_data(&self, token: &str) -> SyncResult<Value> {
        let request = self.client.get(self.url("/data/export")).bearer_auth(token);
        let response = self.send(request, self.request_timeout).await?;
        self.json(response, self.request_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "Bearer tok-1")
            .unwrap_or(false)
    }

    async fn upload(headers: HeaderMap, mut multipart: Multipart) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad token"})));
        }
        let mut data: Option<Value> = None;
        let mut file_len = 0usize;
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("data") => {
                    let text = field.text().await.unwrap_or_default();
                    data = serde_json::from_str(&text).ok();
                }
                Some("file") => file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0),
                _ => {}
            }
        }
        match data {
            Some(meta) if meta["filename"] == "a.pdf" && file_len == 5 => {
                (StatusCode::OK, Json(json!({"id": 42})))
            }
            Some(meta) if file_len == 0 => (StatusCode::OK, Json(json!({"id": format!("meta-{}", meta["id"])}))),
            _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "missing data"}))),
        }
    }

    async fn sync(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        let since = q.get("since").cloned().unwrap_or_else(|| "none".to_string());
        (
            StatusCode::OK,
            Json(json!({
                "documents": [{"id": "srv-1", "filename": "a.pdf", "extractedText": since}],
                "lastSync": "mark-2"
            })),
        )
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(3)).await;
        "late"
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .route(
                "/api/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "pw" {
                        (StatusCode::OK, Json(json!({"token": "tok-1", "user": {"id": 1, "email": body["email"]}})))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"})))
                    }
                }),
            )
            .route("/api/auth/refresh", post(|| async { Json(json!({"token": "tok-2"})) }))
            .route("/api/auth/logout", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/api/documents/upload", post(upload))
            .route("/api/documents/sync", get(sync))
            .route("/api/sync/status", get(|| async { Json(json!({"queued": 0})) }))
            .route("/slow/health", get(slow));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn remote(base: &str, path: &str) -> HttpRemote {
        let mut config = SyncConfig::default();
        config.remote.base_url = format!("{}{}", base, path);
        config.remote.probe_timeout_secs = 1;
        HttpRemote::new(&config).unwrap()
    }

    fn metadata(id: i64, filename: &str) -> UploadMetadata {
        UploadMetadata {
            id,
            filename: filename.to_string(),
            file_type: Some("application/pdf".to_string()),
            size: Some(5),
            processed_data: None,
            extracted_text: None,
            confidence_score: None,
            status: "completed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_health_and_login() {
        let base = spawn_server().await;
        let api = remote(&base, "/api/");

        api.health().await.unwrap();

        let login = api.login("ops@example.com", "pw").await.unwrap();
        assert_eq!(login.token, "tok-1");
        assert_eq!(login.user.unwrap()["email"], "ops@example.com");

        let err = api.login("ops@example.com", "wrong").await.unwrap_err();
        match err {
            SyncError::RemoteRejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_multipart_with_numeric_id() {
        let base = spawn_server().await;
        let api = remote(&base, "/api");

        let upload = DocumentUpload {
            metadata: metadata(1, "a.pdf"),
            file: Some(FilePart {
                file_name: "a.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                bytes: b"%PDF-".to_vec(),
            }),
        };
        assert_eq!(api.upload_document("tok-1", &upload).await.unwrap(), "42");

        let metadata_only = DocumentUpload {
            metadata: metadata(7, "b.pdf"),
            file: None,
        };
        assert_eq!(
            api.upload_document("tok-1", &metadata_only).await.unwrap(),
            "meta-7"
        );

        let err = api.upload_document("other", &upload).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_fetch_changes_echoes_since() {
        let base = spawn_server().await;
        let api = remote(&base, "/api");

        let batch = api.fetch_changes("tok-1", Some("mark-1")).await.unwrap();
        assert_eq!(batch.last_sync.as_deref(), Some("mark-2"));
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].extracted_text.as_deref(), Some("mark-1"));

        let batch = api.fetch_changes("tok-1", None).await.unwrap();
        assert_eq!(batch.documents[0].extracted_text.as_deref(), Some("none"));
    }

    #[tokio::test]
    async fn test_refresh_status_and_rejections() {
        let base = spawn_server().await;
        let api = remote(&base, "/api");

        assert_eq!(api.refresh("tok-1").await.unwrap(), "tok-2");
        assert_eq!(api.sync_status("tok-1").await.unwrap()["queued"], 0);

        let err = api.logout("tok-1").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { status: 500, .. }));
        assert!(err.is_retryable());

        let err = api.export_data("tok-1").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let base = spawn_server().await;
        let api = remote(&base, "/slow");

        let err = api.health().await.unwrap_err();
        assert!(matches!(err, SyncError::NetworkTimeout(1)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = remote(&format!("http://{}", addr), "/api");
        let err = api.health().await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(rejection_message(r#"{"message":"nope"}"#, None), "nope");
        assert_eq!(rejection_message(r#"{"error":"bad"}"#, None), "bad");
        assert_eq!(rejection_message("", Some("Not Found")), "Not Found");
        assert_eq!(rejection_message("plain text", None), "plain text");
    }
}
