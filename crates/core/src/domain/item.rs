// Queued Item Domain Model

use serde::{Deserialize, Serialize};

/// Item key (stringified pipeline ID)
pub type ItemKey = String;

/// Priority (higher number = higher priority)
pub type Priority = i64;

/// A queued unit of work.
///
/// Ordering is (priority desc, creation time asc). The heap keeps its own
/// key -> slot bookkeeping; items carry no positional state themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub key: ItemKey,
    pub priority: Priority,
    pub creation_time_ms: i64, // epoch ms
}

impl Item {
    pub fn new(key: impl Into<String>, priority: Priority, creation_time_ms: i64) -> Self {
        Self {
            key: key.into(),
            priority,
            creation_time_ms,
        }
    }

    /// True if `self` must be dequeued before `other`.
    ///
    /// Higher priority wins; equal priority falls back to earlier creation
    /// time. Equal on both is undefined order.
    pub fn ranks_before(&self, other: &Item) -> bool {
        if self.priority != other.priority {
            return self.priority > other.priority;
        }
        self.creation_time_ms < other.creation_time_ms
    }
}
