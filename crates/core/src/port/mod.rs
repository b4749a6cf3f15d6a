// Port Layer - Interfaces for external collaborators

pub mod event_sink;
pub mod pipeline_store;
pub mod precheck;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use event_sink::{AdmissionEvent, EventKind, EventSink, NoopEventSink};
pub use pipeline_store::PipelineStore;
pub use precheck::{AdmissionPrecheck, AdmitAll, PrecheckResult};
pub use time_provider::{SystemTimeProvider, TimeProvider};
