// Queue Definition Domain Model

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Queue identifier
pub type QueueId = String;

/// Admission iteration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueMode {
    /// Stop at the first blocked item (FIFO-by-priority, head-of-line
    /// blocking).
    Strict,
    /// Skip blocked items and consider the next candidate.
    BestEffort,
}

/// Queue definition: concurrency window, resource budgets, mode.
///
/// A budget of 0.0 means the corresponding resource check is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: QueueId,
    /// Max concurrently-processing items (the processing window).
    pub concurrency: i64,
    pub max_cpu: f64,
    pub max_memory_mb: f64,
    pub mode: QueueMode,
    /// Priority assigned to items that carry no custom priority.
    pub default_priority: i64,
}

impl QueueConfig {
    pub fn new(id: impl Into<String>, concurrency: i64, mode: QueueMode) -> Self {
        Self {
            id: id.into(),
            concurrency,
            max_cpu: 0.0,
            max_memory_mb: 0.0,
            mode,
            default_priority: 0,
        }
    }

    pub fn with_budgets(mut self, max_cpu: f64, max_memory_mb: f64) -> Self {
        self.max_cpu = max_cpu;
        self.max_memory_mb = max_memory_mb;
        self
    }

    pub fn with_default_priority(mut self, priority: i64) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.mode == QueueMode::Strict
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::InvalidQueueDefinition(
                "queue id must not be empty".to_string(),
            ));
        }
        if self.concurrency < 0 {
            return Err(DomainError::InvalidQueueDefinition(format!(
                "concurrency must not be negative, got {}",
                self.concurrency
            )));
        }
        if self.max_cpu < 0.0 || self.max_memory_mb < 0.0 {
            return Err(DomainError::InvalidQueueDefinition(
                "resource budgets must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_id() {
        let cfg = QueueConfig::new("", 1, QueueMode::Strict);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_concurrency() {
        let cfg = QueueConfig::new("q", -1, QueueMode::Strict);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_zero_budgets() {
        // Zero budgets mean "unlimited", not "nothing fits"
        let cfg = QueueConfig::new("q", 10, QueueMode::BestEffort);
        assert!(cfg.validate().is_ok());
    }
}
