// Enhanced Queue - pending heap + window-bounded processing heap
//
// Governs the pending -> processing transition. One internal lock guards
// all state; membership predicates take the read path. No method awaits,
// so the lock is never held across a suspension point.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemKey, Priority};
use crate::error::Result;

use super::priority_heap::PriorityHeap;

/// Typed snapshot of an enhanced queue's full state.
///
/// Opaque and versionless once serialized; import fully replaces the
/// queue's in-memory state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedQueueSnapshot {
    pub pending: Vec<Item>,
    pub processing: Vec<Item>,
    pub processing_window: i64,
}

struct Inner {
    pending: PriorityHeap,
    processing: PriorityHeap,
    processing_window: i64,
}

/// Two-stage queue: an unbounded pending heap and a processing heap
/// bounded in effect by a mutable concurrency window.
///
/// An item is in at most one of {pending, processing} at a time.
pub struct EnhancedQueue {
    inner: RwLock<Inner>,
}

impl EnhancedQueue {
    pub fn new(processing_window: i64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                pending: PriorityHeap::new(),
                processing: PriorityHeap::new(),
                processing_window,
            }),
        }
    }

    /// Insert into pending. Always succeeds; an existing key gets its
    /// priority updated instead.
    pub fn add(&self, key: impl Into<ItemKey>, priority: Priority, creation_time_ms: i64) {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        inner
            .pending
            .add(Item::new(key.into(), priority, creation_time_ms));
    }

    /// Promote the head of pending into processing.
    ///
    /// Returns `None` if pending is empty or processing is at/above the
    /// window. Dry-run performs the same eligibility check without
    /// mutating state.
    pub fn pop_pending(&self, dry_run: bool) -> Option<ItemKey> {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        let head = inner.pending.peek()?.key.clone();
        inner.promote(&head, dry_run)
    }

    /// Promote a specific pending key into processing, same eligibility
    /// rule as [`pop_pending`](Self::pop_pending). Used by best-effort
    /// admission where the candidate may not be the heap head.
    pub fn pop_pending_key(&self, key: &str, dry_run: bool) -> Option<ItemKey> {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        if !inner.pending.contains(key) {
            return None;
        }
        inner.promote(key, dry_run)
    }

    /// Remove a key from processing (work completed).
    ///
    /// Returns `None` if the key is not currently processing.
    pub fn pop_processing(&self, key: &str, dry_run: bool) -> Option<ItemKey> {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        if !inner.processing.contains(key) {
            return None;
        }
        if dry_run {
            return Some(key.to_string());
        }
        inner.processing.remove(key).map(|item| item.key)
    }

    /// Remove a key from wherever it currently sits. Idempotent.
    pub fn remove(&self, key: &str) -> Option<Item> {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        inner
            .pending
            .remove(key)
            .or_else(|| inner.processing.remove(key))
    }

    pub fn in_pending(&self, key: &str) -> bool {
        self.read(|inner| inner.pending.contains(key))
    }

    pub fn in_processing(&self, key: &str) -> bool {
        self.read(|inner| inner.processing.contains(key))
    }

    pub fn in_queue(&self, key: &str) -> bool {
        self.read(|inner| inner.pending.contains(key) || inner.processing.contains(key))
    }

    pub fn pending_len(&self) -> usize {
        self.read(|inner| inner.pending.len())
    }

    pub fn processing_len(&self) -> usize {
        self.read(|inner| inner.processing.len())
    }

    pub fn peek_pending(&self) -> Option<Item> {
        self.read(|inner| inner.pending.peek().cloned())
    }

    pub fn peek_processing(&self) -> Option<Item> {
        self.read(|inner| inner.processing.peek().cloned())
    }

    /// Pending items in dequeue order (reconciliation walk).
    pub fn pending_sorted(&self) -> Vec<Item> {
        self.read(|inner| inner.pending.sorted_items())
    }

    /// Processing items, unordered (resource accounting).
    pub fn processing_items(&self) -> Vec<Item> {
        self.read(|inner| inner.processing.items())
    }

    pub fn pending_items(&self) -> Vec<Item> {
        self.read(|inner| inner.pending.items())
    }

    pub fn processing_window(&self) -> i64 {
        self.read(|inner| inner.processing_window)
    }

    /// Adjust the window. Never evicts items already processing; only
    /// future admission decisions change.
    pub fn set_processing_window(&self, window: i64) {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        inner.processing_window = window;
    }

    /// Typed snapshot of the full state.
    pub fn snapshot(&self) -> EnhancedQueueSnapshot {
        self.read(|inner| EnhancedQueueSnapshot {
            pending: inner.pending.items(),
            processing: inner.processing.items(),
            processing_window: inner.processing_window,
        })
    }

    /// Replace the full state from a typed snapshot.
    pub fn restore(&self, snapshot: EnhancedQueueSnapshot) {
        let mut inner = self.inner.write().expect("enhanced queue lock poisoned");
        inner.pending = PriorityHeap::from_items(snapshot.pending);
        inner.processing = PriorityHeap::from_items(snapshot.processing);
        inner.processing_window = snapshot.processing_window;
    }

    /// Serialize the full state as an opaque blob.
    pub fn export(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.snapshot())?)
    }

    /// Restore state from an exported blob, fully replacing what exists.
    pub fn import(&self, blob: &[u8]) -> Result<()> {
        let snapshot: EnhancedQueueSnapshot = serde_json::from_slice(blob)?;
        self.restore(snapshot);
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let inner = self.inner.read().expect("enhanced queue lock poisoned");
        f(&inner)
    }
}

impl Inner {
    fn promote(&mut self, key: &str, dry_run: bool) -> Option<ItemKey> {
        if self.processing.len() as i64 >= self.processing_window {
            return None;
        }
        if dry_run {
            return Some(key.to_string());
        }
        let item = self.pending.remove(key)?;
        let popped = item.key.clone();
        self.processing.add(item);
        Some(popped)
    }
}
