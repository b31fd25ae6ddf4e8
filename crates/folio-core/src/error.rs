//! # Error Types
//!
//! Domain-specific error types for folio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  folio-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  folio-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  folio-sync errors (separate crate)                                    │
//! │  └── SyncError        - What the engine and CLI see                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError → CLI         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document cannot be found.
    ///
    /// ## When This Occurs
    /// - `retry_failed` called with an unknown local id
    /// - Document deleted between enqueue and upload
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Backup bundle is structurally wrong.
    #[error("Invalid backup bundle: {reason}")]
    InvalidBundle { reason: String },

    /// Backup bundle was written by a newer layout.
    #[error("Unsupported bundle version {found} (supported: {supported})")]
    UnsupportedBundleVersion { found: u32, supported: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a record is written locally or sent to the server.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., an email without a host).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
