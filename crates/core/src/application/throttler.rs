// Multi-Queue Throttler - one key admitted across several queues at once
//
// Two-phase check-then-commit: dry-run every associated queue first, and
// only when all report eligibility re-run the pops for real. No participant
// is ever mutated unless all are eligible, so a key can never end up
// processing in one queue while stuck pending in another.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ItemKey, Priority};
use crate::error::Result;

use super::enhanced_queue::{EnhancedQueue, EnhancedQueueSnapshot};

/// Window used when a binding does not supply one.
pub const DEFAULT_PROCESSING_WINDOW: i64 = 100;

/// One queue a key wants admission from.
#[derive(Debug, Clone)]
pub struct QueueBinding {
    pub queue_name: String,
    /// Window to apply to the queue; `None` keeps the existing window
    /// (or the default when the queue is created by this call).
    pub window: Option<i64>,
    pub priority: Priority,
    pub creation_time_ms: i64,
}

/// Per-queue outcome of a throttler pop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopDetail {
    pub queue_name: String,
    pub eligible: bool,
}

/// Serialized throttler state: queue snapshots (dangling queues included)
/// plus key -> queue-name associations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThrottlerSnapshot {
    pub queues: BTreeMap<String, EnhancedQueueSnapshot>,
    pub key_bindings: BTreeMap<ItemKey, Vec<String>>,
}

struct Inner {
    queue_by_name: HashMap<String, EnhancedQueue>,
    key_to_queues: HashMap<ItemKey, BTreeSet<String>>,
}

/// Associates one logical key with several enhanced queues and pops them
/// all-or-nothing.
pub struct Throttler {
    inner: RwLock<Inner>,
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new()
    }
}

impl Throttler {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                queue_by_name: HashMap::new(),
                key_to_queues: HashMap::new(),
            }),
        }
    }

    /// Idempotent create-or-update-window.
    pub fn add_queue(&self, name: impl Into<String>, window: i64) {
        let name = name.into();
        let mut inner = self.inner.write().expect("throttler lock poisoned");
        match inner.queue_by_name.get(&name) {
            Some(queue) => queue.set_processing_window(window),
            None => {
                inner
                    .queue_by_name
                    .insert(name, EnhancedQueue::new(window));
            }
        }
    }

    /// Enqueue `key` into every bound queue and record the association.
    ///
    /// Queues are created on demand; a supplied window overrides the
    /// queue's current one.
    pub fn add_key_to_queues(&self, key: impl Into<ItemKey>, bindings: Vec<QueueBinding>) {
        let key = key.into();
        let mut inner = self.inner.write().expect("throttler lock poisoned");
        for binding in bindings {
            let queue = inner
                .queue_by_name
                .entry(binding.queue_name.clone())
                .or_insert_with(|| {
                    EnhancedQueue::new(binding.window.unwrap_or(DEFAULT_PROCESSING_WINDOW))
                });
            if let Some(window) = binding.window {
                if queue.processing_window() != window {
                    queue.set_processing_window(window);
                }
            }
            queue.add(key.clone(), binding.priority, binding.creation_time_ms);
            inner
                .key_to_queues
                .entry(key.clone())
                .or_default()
                .insert(binding.queue_name);
        }
    }

    pub fn has_queue(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("throttler lock poisoned");
        inner.queue_by_name.contains_key(name)
    }

    pub fn queue_names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("throttler lock poisoned");
        inner.queue_by_name.keys().cloned().collect()
    }

    /// Admit `key` across all its associated queues, or none of them.
    ///
    /// A key with no recorded associations is trivially admitted.
    pub fn pop_pending(&self, key: &str) -> (bool, Vec<PopDetail>) {
        // Exclusive guard: the check and commit phases must not interleave
        // with another key's pop.
        let inner = self.inner.write().expect("throttler lock poisoned");
        let names = match inner.key_to_queues.get(key) {
            Some(names) => names.clone(),
            None => return (true, Vec::new()),
        };

        // Phase 1: pure eligibility check. The key must be the dequeue
        // head of every queue AND every window must have room.
        let mut details = Vec::with_capacity(names.len());
        let mut all_eligible = true;
        for name in &names {
            let eligible = inner
                .queue_by_name
                .get(name)
                .and_then(|q| q.pop_pending(true))
                .is_some_and(|head| head == key);
            if !eligible {
                all_eligible = false;
            }
            details.push(PopDetail {
                queue_name: name.clone(),
                eligible,
            });
        }
        if !all_eligible {
            debug!(key = %key, ?details, "throttler pop rejected, not all queues eligible");
            return (false, details);
        }

        // Phase 2: commit. Eligibility was just verified under the same
        // guard, so a head mismatch here means heap corruption.
        for name in &names {
            let queue = inner
                .queue_by_name
                .get(name)
                .expect("queue vanished between check and commit");
            match queue.pop_pending(false) {
                Some(popped) if popped == key => {}
                other => panic!(
                    "throttler commit popped {:?} from queue {:?}, expected {:?}",
                    other, name, key
                ),
            }
        }
        (true, details)
    }

    /// Complete `key` across all its associated queues, or none of them.
    ///
    /// On full success the key's association is deleted.
    pub fn pop_processing(&self, key: &str) -> (bool, Vec<PopDetail>) {
        let mut inner = self.inner.write().expect("throttler lock poisoned");
        let names = match inner.key_to_queues.get(key) {
            Some(names) => names.clone(),
            None => return (true, Vec::new()),
        };

        let mut details = Vec::with_capacity(names.len());
        let mut all_eligible = true;
        for name in &names {
            let eligible = inner
                .queue_by_name
                .get(name)
                .and_then(|q| q.pop_processing(key, true))
                .is_some();
            if !eligible {
                all_eligible = false;
            }
            details.push(PopDetail {
                queue_name: name.clone(),
                eligible,
            });
        }
        if !all_eligible {
            return (false, details);
        }

        for name in &names {
            let queue = inner
                .queue_by_name
                .get(name)
                .expect("queue vanished between check and commit");
            queue.pop_processing(key, false);
        }
        inner.key_to_queues.remove(key);
        (true, details)
    }

    /// Serialize queue definitions and key associations. Dangling queues
    /// (no pending/processing items) are preserved by name.
    pub fn export(&self) -> Result<Vec<u8>> {
        let inner = self.inner.read().expect("throttler lock poisoned");
        let snapshot = ThrottlerSnapshot {
            queues: inner
                .queue_by_name
                .iter()
                .map(|(name, queue)| (name.clone(), queue.snapshot()))
                .collect(),
            key_bindings: inner
                .key_to_queues
                .iter()
                .map(|(key, names)| (key.clone(), names.iter().cloned().collect()))
                .collect(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Restore from an exported blob, fully replacing existing state.
    pub fn import(&self, blob: &[u8]) -> Result<()> {
        let snapshot: ThrottlerSnapshot = serde_json::from_slice(blob)?;
        let mut inner = self.inner.write().expect("throttler lock poisoned");
        inner.queue_by_name = snapshot
            .queues
            .into_iter()
            .map(|(name, qs)| {
                let queue = EnhancedQueue::new(qs.processing_window);
                queue.restore(qs);
                (name, queue)
            })
            .collect();
        inner.key_to_queues = snapshot
            .key_bindings
            .into_iter()
            .map(|(key, names)| (key, names.into_iter().collect()))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, window: Option<i64>, priority: i64) -> QueueBinding {
        QueueBinding {
            queue_name: name.to_string(),
            window,
            priority,
            creation_time_ms: 0,
        }
    }

    #[test]
    fn test_unassociated_key_is_trivially_admitted() {
        let throttler = Throttler::new();
        let (admitted, details) = throttler.pop_pending("ghost");
        assert!(admitted);
        assert!(details.is_empty());
    }

    #[test]
    fn test_all_or_nothing_admission() {
        let throttler = Throttler::new();
        // Queue A has room; queue B has a closed window.
        throttler.add_key_to_queues(
            "k",
            vec![binding("a", Some(1), 0), binding("b", Some(0), 0)],
        );

        let (admitted, details) = throttler.pop_pending("k");
        assert!(!admitted);
        let b = details.iter().find(|d| d.queue_name == "b").unwrap();
        assert!(!b.eligible);

        // No partial admission: still pending in BOTH queues.
        let inner = throttler.inner.read().unwrap();
        assert!(inner.queue_by_name["a"].in_pending("k"));
        assert!(inner.queue_by_name["b"].in_pending("k"));
        assert_eq!(inner.queue_by_name["a"].processing_len(), 0);
    }

    #[test]
    fn test_admission_commits_across_all_queues() {
        let throttler = Throttler::new();
        throttler.add_key_to_queues(
            "k",
            vec![binding("a", Some(1), 0), binding("b", Some(2), 0)],
        );

        let (admitted, details) = throttler.pop_pending("k");
        assert!(admitted);
        assert_eq!(details.len(), 2);
        assert!(details.iter().all(|d| d.eligible));

        let inner = throttler.inner.read().unwrap();
        assert!(inner.queue_by_name["a"].in_processing("k"));
        assert!(inner.queue_by_name["b"].in_processing("k"));
    }

    #[test]
    fn test_head_blocked_by_other_key() {
        let throttler = Throttler::new();
        throttler.add_key_to_queues("first", vec![binding("a", Some(10), 9)]);
        throttler.add_key_to_queues("second", vec![binding("a", Some(10), 1)]);

        // "second" is not the head of queue a, so it cannot pop yet.
        let (admitted, _) = throttler.pop_pending("second");
        assert!(!admitted);

        let (admitted, _) = throttler.pop_pending("first");
        assert!(admitted);
        let (admitted, _) = throttler.pop_pending("second");
        assert!(admitted);
    }

    #[test]
    fn test_pop_processing_cleans_association() {
        let throttler = Throttler::new();
        throttler.add_key_to_queues("k", vec![binding("a", Some(1), 0)]);
        assert!(throttler.pop_pending("k").0);

        let (completed, _) = throttler.pop_processing("k");
        assert!(completed);

        // Association deleted: a second completion is trivial.
        let (completed, details) = throttler.pop_processing("k");
        assert!(completed);
        assert!(details.is_empty());
    }

    #[test]
    fn test_pop_processing_requires_all_queues() {
        let throttler = Throttler::new();
        throttler.add_key_to_queues(
            "k",
            vec![binding("a", Some(1), 0), binding("b", Some(1), 0)],
        );
        assert!(throttler.pop_pending("k").0);

        // Manually complete in one queue to desync, then the mirror
        // protocol must refuse and leave the association intact.
        {
            let inner = throttler.inner.read().unwrap();
            inner.queue_by_name["a"].pop_processing("k", false);
        }
        let (completed, _) = throttler.pop_processing("k");
        assert!(!completed);
        let inner = throttler.inner.read().unwrap();
        assert!(inner.key_to_queues.contains_key("k"));
        assert!(inner.queue_by_name["b"].in_processing("k"));
    }

    #[test]
    fn test_add_queue_is_idempotent_window_update() {
        let throttler = Throttler::new();
        throttler.add_queue("a", 5);
        throttler.add_queue("a", 7);
        let inner = throttler.inner.read().unwrap();
        assert_eq!(inner.queue_by_name["a"].processing_window(), 7);
        assert_eq!(inner.queue_by_name.len(), 1);
    }

    #[test]
    fn test_export_import_preserves_dangling_queues() {
        let throttler = Throttler::new();
        throttler.add_queue("dangling", 3);
        throttler.add_key_to_queues("k", vec![binding("a", Some(2), 5)]);

        let blob = throttler.export().unwrap();

        let restored = Throttler::new();
        restored.import(&blob).unwrap();
        assert!(restored.has_queue("dangling"));
        assert!(restored.has_queue("a"));

        let (admitted, _) = restored.pop_pending("k");
        assert!(admitted);
        let inner = restored.inner.read().unwrap();
        assert_eq!(inner.queue_by_name["dangling"].processing_window(), 3);
        assert!(inner.queue_by_name["a"].in_processing("k"));
    }
}
