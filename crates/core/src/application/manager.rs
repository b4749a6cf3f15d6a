// Queue Manager - registry, lifecycle, binding resolution, fan-out

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::domain::{DomainError, PipelineId, QueueConfig, QueueId};
use crate::error::{AppError, Result};
use crate::port::{AdmissionPrecheck, EventSink, PipelineStore, TimeProvider};

use super::admission::{Queue, QueueUsage};
use super::shutdown::ShutdownToken;

/// Errors surfaced to callers of the manager.
///
/// `needs_retry()` marks failures that are worth re-driving (transient
/// store lookups) versus definitive ones.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("pipeline {id} lookup failed: {source}")]
    PipelineLookup {
        id: PipelineId,
        #[source]
        source: AppError,
    },

    #[error("queue definition {queue_id} lookup failed: {source}")]
    QueueDefinitionLookup {
        queue_id: QueueId,
        #[source]
        source: AppError,
    },

    #[error("pipeline not found: {0}")]
    PipelineNotFound(PipelineId),

    #[error("queue definition not found: {0}")]
    QueueDefinitionNotFound(QueueId),

    #[error(transparent)]
    InvalidQueueDefinition(#[from] DomainError),
}

impl ManagerError {
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            ManagerError::PipelineLookup { .. } | ManagerError::QueueDefinitionLookup { .. }
        )
    }
}

/// Registry of admission queues.
///
/// Queues are added idempotently and each queue's control loop is started
/// exactly once for the process lifetime. The registry lock is separate
/// from every queue's own lock and is never held across an await.
pub struct QueueManager {
    queues: RwLock<HashMap<QueueId, Arc<Queue>>>,
    store: Arc<dyn PipelineStore>,
    events: Arc<dyn EventSink>,
    precheck: Arc<dyn AdmissionPrecheck>,
    time: Arc<dyn TimeProvider>,
    shutdown: ShutdownToken,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        events: Arc<dyn EventSink>,
        precheck: Arc<dyn AdmissionPrecheck>,
        time: Arc<dyn TimeProvider>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            store,
            events,
            precheck,
            time,
            shutdown,
        }
    }

    pub fn queue(&self, id: &str) -> Option<Arc<Queue>> {
        self.queues
            .read()
            .expect("queue registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn queue_count(&self) -> usize {
        self.queues
            .read()
            .expect("queue registry lock poisoned")
            .len()
    }

    /// Look up by id; construct, register and start if absent, otherwise
    /// update the live parameters in place and return the existing
    /// instance.
    pub fn idempotent_add_queue(&self, config: QueueConfig) -> Arc<Queue> {
        let mut queues = self.queues.write().expect("queue registry lock poisoned");
        if let Some(existing) = queues.get(&config.id) {
            existing.update_config(config);
            return existing.clone();
        }
        info!(queue_id = %config.id, concurrency = config.concurrency, "registering queue");
        let queue = Arc::new(Queue::new(
            config.clone(),
            self.store.clone(),
            self.events.clone(),
            self.precheck.clone(),
            self.time.clone(),
        ));
        queue.start(self.shutdown.clone());
        queues.insert(config.id, queue.clone());
        queue
    }

    /// Admit a pipeline into its bound queue and hand back the completion
    /// signal the caller suspends on.
    ///
    /// Fast path: a pipeline that already passed the queue phase, or has
    /// no bound queue, gets an already-fired signal.
    pub async fn put_pipeline_into_queue(
        &self,
        id: PipelineId,
    ) -> std::result::Result<oneshot::Receiver<()>, ManagerError> {
        let pipeline = self
            .store
            .get_pipeline(id)
            .await
            .map_err(|source| ManagerError::PipelineLookup { id, source })?
            .ok_or(ManagerError::PipelineNotFound(id))?;

        if pipeline.phase.has_passed_queue() {
            debug!(pipeline_id = id, "already past queue phase, bypassing admission");
            return Ok(fired_signal());
        }
        let queue_id = match &pipeline.bound_queue_id {
            Some(queue_id) => queue_id.clone(),
            None => {
                debug!(pipeline_id = id, "no bound queue, bypassing admission");
                return Ok(fired_signal());
            }
        };

        let config = self
            .store
            .get_queue_definition(&queue_id)
            .await
            .map_err(|source| ManagerError::QueueDefinitionLookup {
                queue_id: queue_id.clone(),
                source,
            })?
            .ok_or_else(|| ManagerError::QueueDefinitionNotFound(queue_id.clone()))?;
        config.validate()?;

        let queue = self.idempotent_add_queue(config);
        let (tx, rx) = oneshot::channel();
        queue.add_pipeline(pipeline, tx);
        Ok(rx)
    }

    /// Remove a pipeline from its bound queue (cancellation/completion).
    /// Idempotent; unresolvable bindings fall back to scanning the
    /// registry.
    pub async fn pop_out_pipeline(&self, id: PipelineId, mark_failed: bool) {
        let key = id.to_string();
        let bound = match self.store.get_pipeline(id).await {
            Ok(Some(pipeline)) => pipeline.bound_queue_id,
            Ok(None) => None,
            Err(e) => {
                warn!(pipeline_id = id, error = %e, "pipeline lookup failed during pop-out");
                None
            }
        };

        if let Some(queue_id) = bound {
            if let Some(queue) = self.queue(&queue_id) {
                queue.pop_out(&key, mark_failed).await;
                return;
            }
        }
        let queues: Vec<Arc<Queue>> = {
            self.queues
                .read()
                .expect("queue registry lock poisoned")
                .values()
                .cloned()
                .collect()
        };
        for queue in queues {
            if queue.contains(&key) {
                queue.pop_out(&key, mark_failed).await;
            }
        }
    }

    /// Fan out one reconciliation tick per registered queue concurrently
    /// and join on all of them.
    pub async fn reconcile_all(&self) {
        let queues: Vec<Arc<Queue>> = {
            self.queues
                .read()
                .expect("queue registry lock poisoned")
                .values()
                .cloned()
                .collect()
        };
        let tasks: Vec<_> = queues
            .into_iter()
            .map(|queue| tokio::spawn(async move { queue.reconcile_once().await }))
            .collect();
        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                error!(error = %e, "queue reconcile task panicked");
            }
        }
    }

    /// Serialize per-queue usage summaries for observability.
    ///
    /// Deliberately NOT sufficient to reconstruct queue state; warm
    /// restart recovery goes through each queue's own export/import.
    pub fn export_usage(&self) -> Result<Vec<u8>> {
        let usages: BTreeMap<QueueId, QueueUsage> = {
            self.queues
                .read()
                .expect("queue registry lock poisoned")
                .iter()
                .map(|(id, queue)| (id.clone(), queue.usage()))
                .collect()
        };
        Ok(serde_json::to_vec(&usages)?)
    }
}

/// One-shot signal that has already fired (fast-path bypass).
fn fired_signal() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(());
    rx
}
