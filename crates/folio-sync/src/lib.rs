//! # folio-sync: Offline-First Sync Engine for Folio
//!
//! This crate reconciles the local document store with the remote document
//! server under intermittent connectivity.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncEngine (Main Orchestrator)                  │  │
//! │  │                                                                  │  │
//! │  │  Owns the retry queue and both timer tasks                      │  │
//! │  │  start() / stop() lifecycle                                     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │    ┌──────────────┬───────────┼─────────────┬──────────────┐           │
//! │    ▼              ▼           ▼             ▼              ▼            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐      │
//! │  │Connecti- │ │Credential│ │RetryQueue│ │Reconciler│ │ Status   │      │
//! │  │vity      │ │Store     │ │          │ │          │ │ Reporter │      │
//! │  │Monitor   │ │          │ │ linear   │ │ upload / │ │          │      │
//! │  │GET       │ │ token +  │ │ backoff, │ │ download,│ │ snapshot │      │
//! │  │/health   │ │ refresh  │ │ audit on │ │ export / │ │ on       │      │
//! │  │          │ │          │ │ give-up  │ │ import   │ │ demand   │      │
//! │  └──────────┘ └──────────┘ └──────────┘ └────┬─────┘ └──────────┘      │
//! │                                              │                          │
//! │                      ┌───────────────────────┴──────────┐               │
//! │                      ▼                                  ▼               │
//! │            ┌──────────────────┐              ┌──────────────────┐       │
//! │            │ dyn LocalStore   │              │ dyn RemoteApi    │       │
//! │            │ (folio-db)       │              │ (HttpRemote)     │       │
//! │            └──────────────────┘              └──────────────────┘       │
//! │                                                                         │
//! │  EVENTS (SyncEventEmitter):                                            │
//! │  • status - snapshot after every drain / manual sync                   │
//! │  • progress - per record during batch uploads and downloads            │
//! │  • error - failures surfaced to the user                               │
//! │  • connectivity - online/offline transitions                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`engine`] - `SyncEngine` orchestrator
//! - [`connectivity`] - Health probe and cached online flag
//! - [`credentials`] - Bearer token lifecycle
//! - [`retry_queue`] - Delay queue with linear backoff
//! - [`reconcile`] - Upload / download / export / import protocols
//! - [`status`] - Status snapshots
//! - [`remote`] - Remote API trait and the `reqwest` client
//! - [`store`] - Local store trait, implemented for `folio_db::Database`
//! - [`events`] - Observer trait for UI layers
//! - [`config`] - TOML configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_sync::{SyncConfig, SyncEngine};
//! use folio_db::{Database, DbConfig};
//!
//! let config = SyncConfig::load(None)?;
//! let db = Arc::new(Database::new(DbConfig::new("folio.db")).await?);
//!
//! let mut engine = SyncEngine::new(config, db).await?;
//! engine.start().await?;
//!
//! let status = engine.status().await?;
//! println!("Online: {}, pending: {}", status.is_online, status.pending_sync);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod connectivity;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod remote;
pub mod retry_queue;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{RemoteSettings, StorageSettings, SyncConfig, SyncMode, SyncSettings};
pub use connectivity::ConnectivityMonitor;
pub use credentials::CredentialStore;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use events::{NoOpEmitter, SyncEventEmitter};
pub use reconcile::Reconciler;
pub use remote::{DocumentUpload, FilePart, HttpRemote, RemoteApi};
pub use retry_queue::{FailureOutcome, RetryPolicy, RetryQueue};
pub use status::StatusReporter;
pub use store::LocalStore;
