//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FOLIO_API_URL=https://docs.example.com/api                         │
//! │     FOLIO_SYNC_MODE=manual                                             │
//! │     FOLIO_DB_PATH=/var/lib/folio/folio.db                              │
//! │     FOLIO_MAX_RETRIES=5                                                │
//! │     FOLIO_MAX_QUEUE_LEN=500                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/folio/sync.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.folio.folio/sync.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [remote]
//! base_url = "http://localhost:3000/api"
//! request_timeout_secs = 30
//! probe_timeout_secs = 5
//! status_timeout_secs = 5
//!
//! [sync]
//! mode = "auto"  # auto | manual | offline
//! connectivity_interval_secs = 30
//! drain_interval_secs = 300
//! max_retries = 3
//! retry_base_delay_ms = 5000
//! max_queue_len = 1000
//!
//! [storage]
//! database_path = "/home/me/.local/share/folio/folio.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Mode
// =============================================================================

/// How much background activity the engine runs.
///
/// ## Mode Selection
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        Sync Mode Behavior                               │
/// │                                                                         │
/// │  AUTO (Default)                                                        │
/// │  ──────────────                                                        │
/// │  • Connectivity probe every 30 s                                       │
/// │  • Retry queue drained every 5 min                                     │
/// │                                                                         │
/// │  MANUAL                                                                │
/// │  ──────                                                                │
/// │  • Connectivity probe only                                             │
/// │  • Queue drained on explicit request ("sync now", `folio drain`)       │
/// │                                                                         │
/// │  OFFLINE                                                               │
/// │  ───────                                                               │
/// │  • No network activity at all                                          │
/// │  • Every remote operation fails with `Offline`                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Both background timers run.
    #[default]
    Auto,

    /// Only the connectivity probe runs.
    Manual,

    /// Sync disabled - local operations only.
    Offline,
}

impl SyncMode {
    /// Returns true if any network activity is allowed.
    pub fn is_sync_enabled(&self) -> bool {
        !matches!(self, SyncMode::Offline)
    }

    /// Returns true if the queue is drained on a timer.
    pub fn drains_automatically(&self) -> bool {
        matches!(self, SyncMode::Auto)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Auto => write!(f, "auto"),
            SyncMode::Manual => write!(f, "manual"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SyncMode::Auto),
            "manual" => Ok(SyncMode::Manual),
            "offline" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: auto, manual, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the remote document server lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for upload, download and auth calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for `GET /health` (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for `GET /sync/status` (seconds).
    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_status_timeout() -> u64 {
    5
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            status_timeout_secs: default_status_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Background activity level.
    #[serde(default)]
    pub mode: SyncMode,

    /// Interval between connectivity probes (seconds).
    #[serde(default = "default_connectivity_interval")]
    pub connectivity_interval_secs: u64,

    /// Interval between retry queue drains (seconds).
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Failed attempts before an item is demoted to the audit log.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step (milliseconds): attempt N waits N × this.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Maximum retry queue length. Overflow stays `pending` in the store.
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,
}

fn default_connectivity_interval() -> u64 {
    30
}
fn default_drain_interval() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay() -> u64 {
    5000
}
fn default_max_queue_len() -> usize {
    1000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            connectivity_interval_secs: default_connectivity_interval(),
            drain_interval_secs: default_drain_interval(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            max_queue_len: default_max_queue_len(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local store location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote server settings.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Local store settings.
    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.remote.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        let intervals = [
            ("remote.request_timeout_secs", self.remote.request_timeout_secs),
            ("remote.probe_timeout_secs", self.remote.probe_timeout_secs),
            ("remote.status_timeout_secs", self.remote.status_timeout_secs),
            ("sync.connectivity_interval_secs", self.sync.connectivity_interval_secs),
            ("sync.drain_interval_secs", self.sync.drain_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.sync.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be greater than 0".into(),
            ));
        }

        if self.sync.max_queue_len == 0 {
            return Err(SyncError::InvalidConfig(
                "max_queue_len must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FOLIO_API_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.remote.base_url = url;
        }

        if let Some(mode) = lookup("FOLIO_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding sync mode from environment");
                    self.sync.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown sync mode in environment"),
            }
        }

        if let Some(path) = lookup("FOLIO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(retries) = lookup("FOLIO_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.sync.max_retries = n;
            }
        }

        if let Some(len) = lookup("FOLIO_MAX_QUEUE_LEN") {
            if let Ok(n) = len.parse::<usize>() {
                self.sync.max_queue_len = n;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "folio", "folio")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the sync mode.
    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    /// Returns true if sync is enabled.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }

    /// Resolved database path: configured, else `<data dir>/folio.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("folio.db")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.probe_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.status_timeout_secs)
    }

    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.sync.connectivity_interval_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.sync.drain_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.sync.retry_base_delay_ms)
    }
}
