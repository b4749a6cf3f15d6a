// Capacity and resource validation for one admission candidate

use crate::domain::{Pipeline, QueueConfig};

/// Resources currently reserved by everything in processing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceInUse {
    pub cpu: f64,
    pub memory_mb: f64,
}

impl ResourceInUse {
    pub fn add(&mut self, cpu: f64, memory_mb: f64) {
        self.cpu += cpu;
        self.memory_mb += memory_mb;
    }
}

/// Why a candidate cannot be admitted this tick. Recoverable by
/// definition; re-evaluated on the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    CapacityReached { processing: usize, concurrency: i64 },
    CpuExceeded { in_use: f64, requested: f64, max: f64 },
    MemoryExceeded { in_use: f64, requested: f64, max: f64 },
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::CapacityReached {
                processing,
                concurrency,
            } => write!(
                f,
                "concurrency window reached: {} processing, window {}",
                processing, concurrency
            ),
            ValidationFailure::CpuExceeded {
                in_use,
                requested,
                max,
            } => write!(
                f,
                "cpu budget exceeded: {:.2} in use + {:.2} requested > {:.2} max",
                in_use, requested, max
            ),
            ValidationFailure::MemoryExceeded {
                in_use,
                requested,
                max,
            } => write!(
                f,
                "memory budget exceeded: {:.0}MB in use + {:.0}MB requested > {:.0}MB max",
                in_use, requested, max
            ),
        }
    }
}

/// Check the candidate against the queue's window and resource budgets.
///
/// A budget of 0.0 disables the corresponding resource check.
pub fn validate_candidate(
    config: &QueueConfig,
    processing_len: usize,
    in_use: ResourceInUse,
    candidate: &Pipeline,
) -> Result<(), ValidationFailure> {
    if processing_len as i64 >= config.concurrency {
        return Err(ValidationFailure::CapacityReached {
            processing: processing_len,
            concurrency: config.concurrency,
        });
    }
    if config.max_cpu > 0.0 && in_use.cpu + candidate.requested_cpu > config.max_cpu {
        return Err(ValidationFailure::CpuExceeded {
            in_use: in_use.cpu,
            requested: candidate.requested_cpu,
            max: config.max_cpu,
        });
    }
    if config.max_memory_mb > 0.0
        && in_use.memory_mb + candidate.requested_memory_mb > config.max_memory_mb
    {
        return Err(ValidationFailure::MemoryExceeded {
            in_use: in_use.memory_mb,
            requested: candidate.requested_memory_mb,
            max: config.max_memory_mb,
        });
    }
    Ok(())
}
