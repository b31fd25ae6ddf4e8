//! Test doubles shared by the unit tests in this crate.

use async_trait::async_trait;
use folio_core::{DownloadBatch, LoginResponse, SyncStatus};
use folio_db::{Database, DbConfig};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{SyncError, SyncResult};
use crate::events::SyncEventEmitter;
use crate::remote::{DocumentUpload, RemoteApi};

pub(crate) async fn memory_db() -> Arc<Database> {
    Arc::new(Database::new(DbConfig::in_memory()).await.unwrap())
}

// =============================================================================
// Fake Remote
// =============================================================================

#[derive(Default)]
struct FakeState {
    unreachable: bool,
    calls: HashMap<&'static str, usize>,
    next_id: u64,
    server_ids: HashMap<String, String>,
    failing_uploads: HashSet<String>,
    fail_all_uploads: bool,
    uploads: Vec<DocumentUpload>,
    batch: DownloadBatch,
    fail_fetch: bool,
    fetch_since: Vec<Option<String>>,
    fail_login: bool,
    fail_logout: bool,
    refresh_token: Option<String>,
    status: Option<Value>,
    export: Option<Value>,
}

/// Scripted in-memory remote that counts every call.
pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        FakeRemote {
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.state.lock().unwrap().calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().unreachable = !reachable;
    }

    pub fn set_server_id(&self, filename: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .server_ids
            .insert(filename.to_string(), id.to_string());
    }

    pub fn fail_uploads_for(&self, filename: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(filename.to_string());
    }

    pub fn set_fail_all_uploads(&self, fail: bool) {
        self.state.lock().unwrap().fail_all_uploads = fail;
    }

    pub fn uploads(&self) -> Vec<DocumentUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn set_batch(&self, batch: DownloadBatch) {
        self.state.lock().unwrap().batch = batch;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn fetch_since(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().fetch_since.clone()
    }

    pub fn set_fail_login(&self, fail: bool) {
        self.state.lock().unwrap().fail_login = fail;
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.state.lock().unwrap().fail_logout = fail;
    }

    pub fn set_refresh_token(&self, token: Option<&str>) {
        self.state.lock().unwrap().refresh_token = token.map(str::to_string);
    }

    pub fn set_status(&self, status: Option<Value>) {
        self.state.lock().unwrap().status = status;
    }

    pub fn set_export(&self, export: Option<Value>) {
        self.state.lock().unwrap().export = export;
    }

    /// Counts the call and fails with a network error when unreachable.
    fn enter(&self, endpoint: &'static str) -> SyncResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(endpoint).or_insert(0) += 1;
        if state.unreachable {
            return Err(SyncError::Network("connection refused".to_string()));
        }
        Ok(state)
    }
}

fn rejected(status: u16) -> SyncError {
    SyncError::RemoteRejected {
        status,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn health(&self) -> SyncResult<()> {
        self.enter("health")?;
        Ok(())
    }

    async fn login(&self, email: &str, _password: &str) -> SyncResult<LoginResponse> {
        let state = self.enter("login")?;
        if state.fail_login {
            return Err(rejected(401));
        }
        Ok(LoginResponse {
            token: "tok-1".to_string(),
            user: Some(json!({"id": 7, "email": email, "name": "Ops"})),
        })
    }

    async fn logout(&self, _token: &str) -> SyncResult<()> {
        let state = self.enter("logout")?;
        if state.fail_logout {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    async fn refresh(&self, _token: &str) -> SyncResult<String> {
        let state = self.enter("refresh")?;
        state.refresh_token.clone().ok_or_else(|| rejected(401))
    }

    async fn upload_document(&self, _token: &str, upload: &DocumentUpload) -> SyncResult<String> {
        let mut state = self.enter("upload")?;
        let filename = upload.metadata.filename.clone();
        if state.fail_all_uploads || state.failing_uploads.contains(&filename) {
            return Err(rejected(503));
        }
        state.uploads.push(upload.clone());
        if let Some(id) = state.server_ids.get(&filename) {
            return Ok(id.clone());
        }
        state.next_id += 1;
        Ok(format!("srv-{}", state.next_id))
    }

    async fn fetch_changes(&self, _token: &str, since: Option<&str>) -> SyncResult<DownloadBatch> {
        let mut state = self.enter("fetch")?;
        state.fetch_since.push(since.map(str::to_string));
        if state.fail_fetch {
            return Err(rejected(500));
        }
        Ok(state.batch.clone())
    }

    async fn sync_status(&self, _token: &str) -> SyncResult<Value> {
        let state = self.enter("status")?;
        state.status.clone().ok_or_else(|| rejected(500))
    }

    async fn export_data(&self, _token: &str) -> SyncResult<Value> {
        let state = self.enter("export")?;
        state.export.clone().ok_or_else(|| rejected(500))
    }
}

// =============================================================================
// Recording Emitter
// =============================================================================

#[derive(Default)]
pub(crate) struct RecordingEmitter {
    statuses: Mutex<Vec<SyncStatus>>,
    progress: Mutex<Vec<(u32, u32)>>,
    errors: Mutex<Vec<(String, bool)>>,
    connectivity: Mutex<Vec<bool>>,
}

impl RecordingEmitter {
    pub fn statuses(&self) -> Vec<SyncStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(u32, u32)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, bool)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn connectivity(&self) -> Vec<bool> {
        self.connectivity.lock().unwrap().clone()
    }
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn emit_progress(&self, done: u32, total: u32) {
        self.progress.lock().unwrap().push((done, total));
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        self.errors.lock().unwrap().push((message.to_string(), retryable));
    }

    fn emit_connectivity(&self, online: bool) {
        self.connectivity.lock().unwrap().push(online);
    }
}
