// Event Sink Port (fire-and-forget admission events)

use serde::Serialize;

use crate::domain::{ItemKey, QueueId};

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Warning,
    Failure,
    Success,
}

/// Human-readable admission event for observability
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionEvent {
    pub queue_id: QueueId,
    pub key: ItemKey,
    pub kind: EventKind,
    pub message: String,
}

impl AdmissionEvent {
    pub fn new(
        queue_id: impl Into<String>,
        key: impl Into<String>,
        kind: EventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            queue_id: queue_id.into(),
            key: key.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Sink for admission events. Fire-and-forget: implementations must not
/// block the control loop and have no way to report failure back.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AdmissionEvent);
}

/// Sink that drops everything (default when observability is unwired)
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: AdmissionEvent) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Collects emitted events for assertions
    pub struct CollectingEventSink {
        events: Mutex<Vec<AdmissionEvent>>,
    }

    impl CollectingEventSink {
        pub fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn events(&self) -> Vec<AdmissionEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count_kind(&self, kind: EventKind) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.kind == kind)
                .count()
        }
    }

    impl Default for CollectingEventSink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EventSink for CollectingEventSink {
        fn emit(&self, event: AdmissionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
