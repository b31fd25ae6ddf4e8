//! # Retry Queue
//!
//! In-memory delay queue of documents waiting for upload.
//!
//! ## Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Retry Queue                                     │
//! │                                                                         │
//! │   enqueue(doc) ──► [ready]                                              │
//! │                       │                                                 │
//! │                 snapshot(now)  (ready and not in flight)               │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │                  [in flight] ─── remove(id) on success ──► gone         │
//! │                       │                                                 │
//! │             record_failure(id, now)                                     │
//! │                       │                                                 │
//! │       retry_count < max ──► [deferred until now + count × base]        │
//! │       retry_count ≥ max ──► Exhausted(item) ──► audit log, gone         │
//! │                                                                         │
//! │  BACKOFF (base 5 s): 5 s, 10 s, 15 s                                    │
//! │  One item per document id; re-adding replaces                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue never sleeps. Deferral is a ready-at instant checked by
//! [`RetryQueue::snapshot`], so tests drive it with explicit instants.

use chrono::Utc;
use folio_core::{Document, DocumentId, QueueItem};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Retry budget and linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt number `retry_count + 1`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.base_delay * retry_count
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// The item stays queued and becomes ready again at `ready_at`.
    Rescheduled { retry_count: u32, ready_at: Instant },
    /// The retry budget is spent; the item has left the queue.
    Exhausted { item: QueueItem },
    /// The item was no longer queued.
    Missing,
}

#[derive(Debug, Clone)]
struct Entry {
    item: QueueItem,
    ready_at: Instant,
}

/// Ordered map of document id to queue item with per-item ready times.
#[derive(Debug)]
pub struct RetryQueue {
    entries: VecDeque<Entry>,
    in_flight: HashSet<DocumentId>,
    policy: RetryPolicy,
    capacity: usize,
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy, capacity: usize) -> Self {
        RetryQueue {
            entries: VecDeque::new(),
            in_flight: HashSet::new(),
            policy,
            capacity,
        }
    }

    fn position(&self, id: DocumentId) -> Option<usize> {
        self.entries.iter().position(|e| e.item.document_id() == id)
    }

    /// Adds or replaces the item for this document, ready immediately.
    ///
    /// Replacing keeps the queue position and the retry count. Returns
    /// false when the queue is full and the document is not already queued.
    pub fn enqueue(&mut self, document: Document, now: Instant) -> bool {
        if let Some(pos) = self.position(document.id) {
            let entry = &mut self.entries[pos];
            entry.item.document = document;
            entry.ready_at = entry.ready_at.min(now);
            return true;
        }

        if self.entries.len() >= self.capacity {
            return false;
        }

        self.entries.push_back(Entry {
            item: QueueItem::new(document, Utc::now()),
            ready_at: now,
        });
        true
    }

    /// Returns the items that are ready and not in flight, in insertion
    /// order, and marks them in flight.
    pub fn snapshot(&mut self, now: Instant) -> Vec<QueueItem> {
        let mut ready = Vec::new();
        for entry in &self.entries {
            let id = entry.item.document_id();
            if entry.ready_at <= now && !self.in_flight.contains(&id) {
                ready.push(entry.item.clone());
            }
        }
        for item in &ready {
            self.in_flight.insert(item.document_id());
        }
        ready
    }

    /// Removes the item for this document. Returns the item if it was queued.
    pub fn remove(&mut self, id: DocumentId) -> Option<QueueItem> {
        self.in_flight.remove(&id);
        let pos = self.position(id)?;
        self.entries.remove(pos).map(|e| e.item)
    }

    /// Counts a failed attempt and either defers or evicts the item.
    pub fn record_failure(&mut self, id: DocumentId, now: Instant) -> FailureOutcome {
        self.in_flight.remove(&id);
        let Some(pos) = self.position(id) else {
            return FailureOutcome::Missing;
        };

        let entry = &mut self.entries[pos];
        entry.item.retry_count += 1;
        let retry_count = entry.item.retry_count;

        if retry_count >= self.policy.max_retries {
            return match self.entries.remove(pos) {
                Some(entry) => FailureOutcome::Exhausted { item: entry.item },
                None => FailureOutcome::Missing,
            };
        }

        let ready_at = now + self.policy.delay_for(retry_count);
        entry.ready_at = ready_at;
        FailureOutcome::Rescheduled {
            retry_count,
            ready_at,
        }
    }

    /// Returns an in-flight item to the ready set without counting a failure.
    pub fn release(&mut self, id: DocumentId) {
        self.in_flight.remove(&id);
    }

    /// Earliest ready time among items not in flight.
    pub fn next_ready_at(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| !self.in_flight.contains(&e.item.document_id()))
            .map(|e| e.ready_at)
            .min()
    }

    pub fn get(&self, id: DocumentId) -> Option<&QueueItem> {
        self.entries
            .iter()
            .find(|e| e.item.document_id() == id)
            .map(|e| &e.item)
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.entries.iter().map(|e| e.item.document_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::SyncState;

    fn doc(id: DocumentId, filename: &str) -> Document {
        let now = Utc::now();
        Document {
            id,
            filename: filename.to_string(),
            file_path: None,
            file_type: None,
            file_size: None,
            processed_data: None,
            extracted_text: None,
            confidence_score: None,
            status: "completed".to_string(),
            sync_status: SyncState::Pending,
            server_id: None,
            last_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn queue() -> RetryQueue {
        RetryQueue::new(RetryPolicy::default(), 10)
    }

    #[test]
    fn test_enqueue_replaces_instead_of_duplicating() {
        let mut q = queue();
        let now = Instant::now();

        assert!(q.enqueue(doc(1, "a.pdf"), now));
        assert!(q.enqueue(doc(2, "b.pdf"), now));
        assert!(q.enqueue(doc(1, "a-renamed.pdf"), now));

        assert_eq!(q.len(), 2);
        assert_eq!(q.ids(), vec![1, 2]);
        assert_eq!(q.get(1).unwrap().document.filename, "a-renamed.pdf");
    }

    #[test]
    fn test_capacity_rejects_new_items_only() {
        let mut q = RetryQueue::new(RetryPolicy::default(), 2);
        let now = Instant::now();

        assert!(q.enqueue(doc(1, "a.pdf"), now));
        assert!(q.enqueue(doc(2, "b.pdf"), now));
        assert!(!q.enqueue(doc(3, "c.pdf"), now));
        assert!(q.enqueue(doc(2, "b.pdf"), now));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_snapshot_skips_in_flight_items() {
        let mut q = queue();
        let now = Instant::now();
        q.enqueue(doc(1, "a.pdf"), now);
        q.enqueue(doc(2, "b.pdf"), now);

        let first = q.snapshot(now);
        assert_eq!(first.len(), 2);

        // A second snapshot during the same pass sees nothing.
        assert!(q.snapshot(now).is_empty());
        assert_eq!(q.len(), 2);

        q.release(2);
        let again = q.snapshot(now);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].document_id(), 2);
    }

    #[test]
    fn test_linear_backoff() {
        let mut q = queue();
        let start = Instant::now();
        q.enqueue(doc(1, "a.pdf"), start);

        q.snapshot(start);
        match q.record_failure(1, start) {
            FailureOutcome::Rescheduled {
                retry_count,
                ready_at,
            } => {
                assert_eq!(retry_count, 1);
                assert_eq!(ready_at, start + Duration::from_secs(5));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(q.snapshot(start + Duration::from_secs(4)).is_empty());
        let t1 = start + Duration::from_secs(5);
        assert_eq!(q.snapshot(t1).len(), 1);

        match q.record_failure(1, t1) {
            FailureOutcome::Rescheduled { retry_count, ready_at } => {
                assert_eq!(retry_count, 2);
                assert_eq!(ready_at, t1 + Duration::from_secs(10));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_exhaustion_after_max_retries() {
        let mut q = queue();
        let mut now = Instant::now();
        q.enqueue(doc(1, "a.pdf"), now);

        for attempt in 1..=3 {
            let batch = q.snapshot(now);
            assert_eq!(batch.len(), 1, "attempt {attempt} should see the item");
            match q.record_failure(1, now) {
                FailureOutcome::Rescheduled { ready_at, .. } => now = ready_at,
                FailureOutcome::Exhausted { item } => {
                    assert_eq!(attempt, 3);
                    assert_eq!(item.retry_count, 3);
                }
                FailureOutcome::Missing => panic!("item vanished"),
            }
        }

        assert!(q.is_empty());
        assert!(q.snapshot(now + Duration::from_secs(60)).is_empty());
        assert_eq!(q.record_failure(1, now), FailureOutcome::Missing);
    }

    #[test]
    fn test_remove() {
        let mut q = queue();
        let now = Instant::now();
        q.enqueue(doc(1, "a.pdf"), now);
        q.snapshot(now);

        assert!(q.remove(1).is_some());
        assert!(q.remove(1).is_none());
        assert!(q.get(1).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn test_re_enqueue_keeps_retry_count() {
        let mut q = queue();
        let now = Instant::now();
        q.enqueue(doc(1, "a.pdf"), now);
        q.snapshot(now);
        q.record_failure(1, now);

        q.enqueue(doc(1, "a.pdf"), now);
        assert_eq!(q.get(1).unwrap().retry_count, 1);
        assert_eq!(q.snapshot(now).len(), 1);
    }

    #[test]
    fn test_next_ready_at_ignores_in_flight() {
        let mut q = queue();
        let start = Instant::now();
        assert_eq!(q.next_ready_at(), None);

        q.enqueue(doc(1, "a.pdf"), start);
        q.enqueue(doc(2, "b.pdf"), start + Duration::from_secs(1));
        assert_eq!(q.next_ready_at(), Some(start));

        let later = start + Duration::from_secs(1);
        assert_eq!(q.snapshot(later).len(), 2);
        assert_eq!(q.next_ready_at(), None);

        q.record_failure(1, later);
        assert_eq!(q.next_ready_at(), Some(later + Duration::from_secs(5)));

        q.release(2);
        assert_eq!(q.next_ready_at(), Some(start + Duration::from_secs(1)));
    }
}
