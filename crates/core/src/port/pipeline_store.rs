// Pipeline Store Port (Interface)

use crate::domain::{Pipeline, PipelineId, PipelineStatus, QueueConfig, QueueId};
use crate::error::Result;
use async_trait::async_trait;

/// Store interface the scheduler consumes: pipeline detail, bound queue
/// definitions, and status writes.
///
/// Absent pipeline/definition is a valid non-error response (`Ok(None)`),
/// meaning "drop from queue" / "not subject to admission".
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Fetch pipeline detail by ID
    async fn get_pipeline(&self, id: PipelineId) -> Result<Option<Pipeline>>;

    /// Fetch the queue definition a pipeline is bound to
    async fn get_queue_definition(&self, queue_id: &QueueId) -> Result<Option<QueueConfig>>;

    /// Persist a pipeline status change.
    ///
    /// Called exactly once by the scheduler, when a retried admission
    /// permanently fails.
    async fn update_status(&self, id: PipelineId, status: PipelineStatus) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock PipelineStore for testing
    ///
    /// Records status updates and can be switched into a failing mode to
    /// exercise retryable lookup errors.
    pub struct MockPipelineStore {
        pipelines: Mutex<HashMap<PipelineId, Pipeline>>,
        queue_definitions: Mutex<HashMap<QueueId, QueueConfig>>,
        status_updates: Mutex<Vec<(PipelineId, PipelineStatus)>>,
        fail_lookups: Mutex<bool>,
    }

    impl MockPipelineStore {
        pub fn new() -> Self {
            Self {
                pipelines: Mutex::new(HashMap::new()),
                queue_definitions: Mutex::new(HashMap::new()),
                status_updates: Mutex::new(Vec::new()),
                fail_lookups: Mutex::new(false),
            }
        }

        pub fn insert_pipeline(&self, pipeline: Pipeline) {
            self.pipelines.lock().unwrap().insert(pipeline.id, pipeline);
        }

        pub fn remove_pipeline(&self, id: PipelineId) {
            self.pipelines.lock().unwrap().remove(&id);
        }

        pub fn insert_queue_definition(&self, config: QueueConfig) {
            self.queue_definitions
                .lock()
                .unwrap()
                .insert(config.id.clone(), config);
        }

        pub fn set_fail_lookups(&self, fail: bool) {
            *self.fail_lookups.lock().unwrap() = fail;
        }

        pub fn status_updates(&self) -> Vec<(PipelineId, PipelineStatus)> {
            self.status_updates.lock().unwrap().clone()
        }
    }

    impl Default for MockPipelineStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PipelineStore for MockPipelineStore {
        async fn get_pipeline(&self, id: PipelineId) -> Result<Option<Pipeline>> {
            if *self.fail_lookups.lock().unwrap() {
                return Err(AppError::Store("mock lookup failure".to_string()));
            }
            Ok(self.pipelines.lock().unwrap().get(&id).cloned())
        }

        async fn get_queue_definition(
            &self,
            queue_id: &QueueId,
        ) -> Result<Option<QueueConfig>> {
            if *self.fail_lookups.lock().unwrap() {
                return Err(AppError::Store("mock lookup failure".to_string()));
            }
            Ok(self.queue_definitions.lock().unwrap().get(queue_id).cloned())
        }

        async fn update_status(&self, id: PipelineId, status: PipelineStatus) -> Result<()> {
            self.status_updates.lock().unwrap().push((id, status));
            if let Some(p) = self.pipelines.lock().unwrap().get_mut(&id) {
                p.status = status;
            }
            Ok(())
        }
    }
}
