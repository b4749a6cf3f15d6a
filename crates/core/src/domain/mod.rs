// Domain Layer - Pure business logic and entities

pub mod error;
pub mod item;
pub mod pipeline;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use item::{Item, ItemKey, Priority};
pub use pipeline::{Pipeline, PipelineId, PipelinePhase, PipelineStatus};
pub use queue::{QueueConfig, QueueId, QueueMode};
