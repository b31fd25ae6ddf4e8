//! # Sync Events
//!
//! Observer seam for UI, tray and notification layers. The engine reports;
//! observers never drive sync.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  emit_connectivity(true/false)  - online/offline transitions           │
//! │  emit_progress(done, total)     - per record during batch uploads      │
//! │  emit_status(&SyncStatus)       - after every drain / sync pass        │
//! │  emit_error(message, retryable) - failures surfaced to the user        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use folio_core::SyncStatus;

/// Trait for emitting sync events.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status snapshot.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits batch progress.
    fn emit_progress(&self, done: u32, total: u32);

    /// Emits a sync error.
    fn emit_error(&self, message: &str, retryable: bool);

    /// Emits an online/offline transition.
    fn emit_connectivity(&self, online: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _done: u32, _total: u32) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
    fn emit_connectivity(&self, _online: bool) {}
}
