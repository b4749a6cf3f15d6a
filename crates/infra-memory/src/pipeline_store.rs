// In-memory PipelineStore adapter
//
// Backs the scheduler in embedded deployments and integration tests; a
// durable store can replace it behind the same port.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use flowgate_core::domain::{Pipeline, PipelineId, PipelineStatus, QueueConfig, QueueId};
use flowgate_core::error::Result;
use flowgate_core::port::PipelineStore;

/// Map-backed pipeline store.
pub struct InMemoryPipelineStore {
    pipelines: RwLock<HashMap<PipelineId, Pipeline>>,
    queue_definitions: RwLock<HashMap<QueueId, QueueConfig>>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            queue_definitions: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert_pipeline(&self, pipeline: Pipeline) {
        self.pipelines
            .write()
            .expect("pipeline map lock poisoned")
            .insert(pipeline.id, pipeline);
    }

    pub fn remove_pipeline(&self, id: PipelineId) -> Option<Pipeline> {
        self.pipelines
            .write()
            .expect("pipeline map lock poisoned")
            .remove(&id)
    }

    pub fn insert_queue_definition(&self, config: QueueConfig) {
        self.queue_definitions
            .write()
            .expect("queue definition map lock poisoned")
            .insert(config.id.clone(), config);
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines
            .read()
            .expect("pipeline map lock poisoned")
            .len()
    }
}

impl Default for InMemoryPipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn get_pipeline(&self, id: PipelineId) -> Result<Option<Pipeline>> {
        Ok(self
            .pipelines
            .read()
            .expect("pipeline map lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn get_queue_definition(&self, queue_id: &QueueId) -> Result<Option<QueueConfig>> {
        Ok(self
            .queue_definitions
            .read()
            .expect("queue definition map lock poisoned")
            .get(queue_id)
            .cloned())
    }

    async fn update_status(&self, id: PipelineId, status: PipelineStatus) -> Result<()> {
        let mut pipelines = self.pipelines.write().expect("pipeline map lock poisoned");
        match pipelines.get_mut(&id) {
            Some(pipeline) => {
                debug!(pipeline_id = id, status = %status, "pipeline status updated");
                pipeline.status = status;
            }
            None => {
                // Status writes for unknown pipelines are dropped, not
                // errors: the scheduler may outlive the pipeline record.
                debug!(pipeline_id = id, status = %status, "status update for unknown pipeline dropped");
            }
        }
        Ok(())
    }
}
