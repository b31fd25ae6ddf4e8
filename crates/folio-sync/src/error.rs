//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Preconditions  │  │    Transport    │  │     Remote              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Offline        │  │  NetworkTimeout │  │  RemoteRejected         │ │
//! │  │  Unauthenticated│  │  Network        │  │  PartialBatchFailure    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Local store   │  │     Internal            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  DatabaseError  │  │  Internal               │ │
//! │  │  InvalidUrl     │  │  Serialization  │  │  Io                     │ │
//! │  │  ConfigLoad/Save│  │  Validation     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Preconditions (`Offline`, `Unauthenticated`) are always raised before any
//! network request is made.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Preconditions
    // =========================================================================
    /// The connectivity monitor reports the server unreachable.
    ///
    /// ## When This Occurs
    /// - Upload, download or refresh attempted while offline
    /// - Engine running in `offline` mode
    #[error("Server is unreachable (offline)")]
    Offline,

    /// No bearer token is stored.
    #[error("Not authenticated. Log in first.")]
    Unauthenticated,

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The server answered with a non-2xx status.
    #[error("Server rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// A request exceeded its deadline.
    #[error("Request timed out after {0} seconds")]
    NetworkTimeout(u64),

    /// Connection refused, DNS failure, reset, or an unreadable response.
    #[error("Network error: {0}")]
    Network(String),

    /// Some records in a batch failed. Reported, not fatal.
    #[error("{failed} of {total} records failed to sync")]
    PartialBatchFailure { failed: u32, total: u32 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local store operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Failed to encode or decode JSON.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Filesystem error (reading an upload, writing a backup).
    #[error("I/O error: {0}")]
    Io(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<folio_db::DbError> for SyncError {
    fn from(err: folio_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<folio_core::ValidationError> for SyncError {
    fn from(err: folio_core::ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<folio_core::CoreError> for SyncError {
    fn from(err: folio_core::CoreError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

/// Classifies transport failures.
///
/// ## Mapping
/// ```text
/// is_timeout()          → NetworkTimeout(secs)
/// is_status()           → RemoteRejected { status, .. }
/// connect / other       → Network
/// ```
/// The timeout length is not recoverable from `reqwest::Error`; callers that
/// know it use [`SyncError::from_reqwest`].
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::from_reqwest(err, 0)
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Maps a reqwest error, recording the timeout that was in force.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            SyncError::NetworkTimeout(timeout_secs)
        } else if let Some(status) = err.status() {
            SyncError::RemoteRejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            SyncError::SerializationFailed(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// ## Retryable Errors
    /// - Offline, timeouts and connection failures
    /// - 5xx, 408 and 429 responses
    ///
    /// ## Non-Retryable Errors
    /// - Missing credentials
    /// - Other 4xx responses
    /// - Configuration and validation errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Offline
            | SyncError::NetworkTimeout(_)
            | SyncError::Network(_)
            | SyncError::PartialBatchFailure { .. } => true,
            SyncError::RemoteRejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns true if the server refused our credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::Unauthenticated | SyncError::RemoteRejected { status: 401, .. }
        )
    }
}
