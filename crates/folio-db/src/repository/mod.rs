//! # Repository Module
//!
//! Database repository implementations for the local store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Sync engine                                                           │
//! │       │                                                                 │
//! │       │  db.documents().list_dirty()                                   │
//! │       ▼                                                                 │
//! │  DocumentRepository                                                    │
//! │  ├── get / find_by_filename / find_by_server_id                        │
//! │  ├── insert / apply_patch                                              │
//! │  └── mark_synced / mark_pending / fail_with_log                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DocumentRepository`](document::DocumentRepository) - Documents and sync state
//! - [`SyncLogRepository`](sync_log::SyncLogRepository) - Append-only failure audit
//! - [`SettingsRepository`](settings::SettingsRepository) - Key/value settings
//! - [`UserRepository`](user::UserRepository) - Cached user profiles

pub mod document;
pub mod settings;
pub mod sync_log;
pub mod user;
