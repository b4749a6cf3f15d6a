// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid queue definition: {0}")]
    InvalidQueueDefinition(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(u64),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
