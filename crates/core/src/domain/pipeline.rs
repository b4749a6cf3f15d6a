// Pipeline Domain Model
//
// The scheduler consumes pipeline details; it never creates or executes
// pipelines itself. The pipeline store port owns the source of truth.

use serde::{Deserialize, Serialize};

use super::item::ItemKey;

/// Pipeline ID
pub type PipelineId = u64;

/// Pipeline lifecycle phase.
///
/// Only the queue phase concerns the scheduler: a pipeline that has
/// already passed it bypasses admission entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelinePhase {
    Init,
    Queue,
    Run,
    Completed,
}

impl PipelinePhase {
    /// True if admission control no longer applies to this pipeline.
    pub fn has_passed_queue(&self) -> bool {
        matches!(self, PipelinePhase::Run | PipelinePhase::Completed)
    }
}

/// Pipeline status (externally visible, stored by the pipeline store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Analyzed,
    Queued,
    Running,
    Success,
    Failed,
    StopByUser,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Analyzed => write!(f, "ANALYZED"),
            PipelineStatus::Queued => write!(f, "QUEUED"),
            PipelineStatus::Running => write!(f, "RUNNING"),
            PipelineStatus::Success => write!(f, "SUCCESS"),
            PipelineStatus::Failed => write!(f, "FAILED"),
            PipelineStatus::StopByUser => write!(f, "STOP_BY_USER"),
        }
    }
}

/// Pipeline detail as the scheduler sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub status: PipelineStatus,
    pub phase: PipelinePhase,

    /// Queue definition this pipeline is bound to; None means the pipeline
    /// is not subject to admission control.
    pub bound_queue_id: Option<String>,

    /// Custom priority; None falls back to the queue default.
    pub priority: Option<i64>,
    /// Creation time in epoch ms; None falls back to enqueue time.
    pub created_at_ms: Option<i64>,

    /// Requested resources, counted against the queue budgets.
    pub requested_cpu: f64,
    pub requested_memory_mb: f64,
}

impl Pipeline {
    /// Key under which this pipeline is tracked in queues.
    pub fn queue_key(&self) -> ItemKey {
        self.id.to_string()
    }

    /// Create a test pipeline bound to a queue (for tests only)
    pub fn new_test(id: PipelineId, bound_queue_id: impl Into<String>) -> Self {
        Self {
            id,
            status: PipelineStatus::Queued,
            phase: PipelinePhase::Queue,
            bound_queue_id: Some(bound_queue_id.into()),
            priority: None,
            created_at_ms: None,
            requested_cpu: 0.0,
            requested_memory_mb: 0.0,
        }
    }
}
