// Event sink that forwards admission events to tracing

use tracing::{error, info, warn};

use flowgate_core::port::{AdmissionEvent, EventKind, EventSink};

/// Forwards admission events to the tracing subscriber at the matching
/// level. Fire-and-forget by construction.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: AdmissionEvent) {
        match event.kind {
            EventKind::Warning => warn!(
                queue_id = %event.queue_id,
                key = %event.key,
                "{}",
                event.message
            ),
            EventKind::Failure => error!(
                queue_id = %event.queue_id,
                key = %event.key,
                "{}",
                event.message
            ),
            EventKind::Success => info!(
                queue_id = %event.queue_id,
                key = %event.key,
                "{}",
                event.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_does_not_panic_without_subscriber() {
        let sink = TracingEventSink;
        sink.emit(AdmissionEvent::new("q", "1", EventKind::Warning, "over budget"));
        sink.emit(AdmissionEvent::new("q", "1", EventKind::Success, "admitted"));
    }
}
