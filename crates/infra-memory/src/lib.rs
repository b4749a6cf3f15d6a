// Flowgate Infrastructure - In-Memory Adapters
// Implements: PipelineStore, EventSink

pub mod event_sink;
pub mod pipeline_store;

pub use event_sink::TracingEventSink;
pub use pipeline_store::InMemoryPipelineStore;
