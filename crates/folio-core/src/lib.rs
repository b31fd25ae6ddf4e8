//! # folio-core: Pure Types for Folio Sync
//!
//! This crate holds the document and synchronization types shared by the
//! local store (`folio-db`) and the sync engine (`folio-sync`). Everything
//! here is plain data plus validation, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Folio Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI / CLI (status + "sync now")                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                folio-sync (SyncEngine, Reconciler)              │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────┐    ┌──────────────▼──────────────┐    │
//! │  │ folio-db (SQLite store)     │    │ Remote document server      │    │
//! │  └──────────────┬──────────────┘    └─────────────────────────────┘    │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ folio-core (THIS CRATE) ★                        │   │
//! │  │   Document • SyncState • QueueItem • SyncStatus • validation    │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Document, SyncLog, SyncStatus, reports, bundles)
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation for local and remote documents
//!
//! ## Example Usage
//!
//! ```rust
//! use folio_core::{SyncState, validation::validate_filename};
//!
//! assert!(validate_filename("invoice-2024.pdf").is_ok());
//! assert_eq!(SyncState::Pending.to_string(), "pending");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Settings key holding the bearer token.
pub const SETTING_AUTH_TOKEN: &str = "auth_token";

/// Settings key holding the cached user profile (JSON).
pub const SETTING_AUTH_USER: &str = "auth_user";

/// Settings key holding the download high-water mark.
pub const SETTING_LAST_SYNC: &str = "last_sync";

/// Audit log kind recorded when a queued upload exhausts its retries.
pub const LOG_KIND_UPLOAD_FAILED: &str = "upload_failed";

/// Table name recorded in audit log entries for documents.
pub const DOCUMENTS_TABLE: &str = "documents";

/// Version of the export bundle layout written by `export_data`.
pub const BUNDLE_VERSION: u32 = 1;
