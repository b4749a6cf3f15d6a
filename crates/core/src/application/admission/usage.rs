// Read-only usage introspection, recomputed on demand

use serde::Serialize;

use crate::domain::{ItemKey, Priority, QueueId};

/// Per-item detail inside a usage snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ItemUsage {
    pub key: ItemKey,
    pub priority: Priority,
    pub creation_time_ms: i64,
    pub requested_cpu: f64,
    pub requested_memory_mb: f64,
}

/// Point-in-time usage summary of one queue.
///
/// `remaining_*` is `max - in_use` with no floor; it goes negative when a
/// window shrink or budget cut strands more work in processing than the
/// new budget allows.
#[derive(Debug, Clone, Serialize)]
pub struct QueueUsage {
    pub queue_id: QueueId,
    pub processing_window: i64,
    pub in_use_cpu: f64,
    pub in_use_memory_mb: f64,
    pub remaining_cpu: f64,
    pub remaining_memory_mb: f64,
    pub processing: Vec<ItemUsage>,
    pub pending: Vec<ItemUsage>,
}
