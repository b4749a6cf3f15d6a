// Admission Queue - capacity/resource validation, retry policy,
// strict/best-effort iteration, event emission
//
// One Queue per queue definition. Owns one EnhancedQueue plus the
// bookkeeping for waiting callers, and runs the periodic reconciliation
// loop that promotes pending items into processing.

pub mod constants;
mod usage;
mod validate;

pub use usage::{ItemUsage, QueueUsage};
pub use validate::{validate_candidate, ResourceInUse, ValidationFailure};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{oneshot, Notify};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

use crate::domain::{Item, ItemKey, Pipeline, PipelineStatus, QueueConfig, QueueId};
use crate::error::Result;
use crate::port::{
    AdmissionEvent, AdmissionPrecheck, EventKind, EventSink, PipelineStore, PrecheckResult,
    TimeProvider,
};

use super::enhanced_queue::EnhancedQueue;
use super::shutdown::ShutdownToken;
use constants::RECONCILE_INTERVAL;

#[derive(Default)]
struct Bookkeeping {
    /// One-shot completion signals, present only while the item is
    /// pending/processing. Dropping a sender unblocks its waiter.
    done_signals: HashMap<ItemKey, oneshot::Sender<()>>,
    /// Work-item details needed for resource validation. Populated on
    /// add, evicted by the owner; never regenerated by the scheduler.
    pipeline_cache: HashMap<ItemKey, Pipeline>,
}

/// Admission-policy wrapper around one [`EnhancedQueue`].
pub struct Queue {
    id: QueueId,
    config: RwLock<QueueConfig>,
    eq: EnhancedQueue,
    book: Mutex<Bookkeeping>,
    started: AtomicBool,
    kick: Notify,
    store: Arc<dyn PipelineStore>,
    events: Arc<dyn EventSink>,
    precheck: Arc<dyn AdmissionPrecheck>,
    time: Arc<dyn TimeProvider>,
}

impl Queue {
    pub fn new(
        config: QueueConfig,
        store: Arc<dyn PipelineStore>,
        events: Arc<dyn EventSink>,
        precheck: Arc<dyn AdmissionPrecheck>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        let eq = EnhancedQueue::new(config.concurrency);
        Self {
            id: config.id.clone(),
            config: RwLock::new(config),
            eq,
            book: Mutex::new(Bookkeeping::default()),
            started: AtomicBool::new(false),
            kick: Notify::new(),
            store,
            events,
            precheck,
            time,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> QueueConfig {
        self.config.read().expect("queue config lock poisoned").clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.eq.in_queue(key)
    }

    /// Apply a redefinition in place: window, budgets and mode change;
    /// items already processing are never disturbed.
    pub fn update_config(&self, config: QueueConfig) {
        self.eq.set_processing_window(config.concurrency);
        let mut current = self.config.write().expect("queue config lock poisoned");
        info!(
            queue_id = %self.id,
            concurrency = config.concurrency,
            max_cpu = config.max_cpu,
            max_memory_mb = config.max_memory_mb,
            "queue definition updated in place"
        );
        *current = config;
        drop(current);
        // A grown window may unblock pending candidates right away.
        self.kick.notify_one();
    }

    /// Insert a pipeline into pending and record the caller's completion
    /// signal. Priority falls back to the queue default, creation time to
    /// now. Kicks the control loop.
    pub fn add_pipeline(&self, pipeline: Pipeline, done_tx: oneshot::Sender<()>) {
        let key = pipeline.queue_key();
        let priority = pipeline.priority.unwrap_or_else(|| {
            self.config
                .read()
                .expect("queue config lock poisoned")
                .default_priority
        });
        let creation_time_ms = pipeline
            .created_at_ms
            .unwrap_or_else(|| self.time.now_millis());

        {
            let mut book = self.book.lock().expect("queue bookkeeping lock poisoned");
            book.pipeline_cache.insert(key.clone(), pipeline);
            // A replaced sender is dropped, which unblocks the previous
            // waiter; re-adding the same key is a caller-side retry.
            if book.done_signals.insert(key.clone(), done_tx).is_some() {
                debug!(queue_id = %self.id, key = %key, "replaced existing done signal");
            }
        }
        self.eq.add(key.clone(), priority, creation_time_ms);
        info!(
            queue_id = %self.id,
            key = %key,
            priority = priority,
            "pipeline added to pending queue"
        );
        self.kick.notify_one();
    }

    /// Drop the cached detail for a key (cache is owner-managed).
    pub fn evict_pipeline(&self, key: &str) {
        let mut book = self.book.lock().expect("queue bookkeeping lock poisoned");
        book.pipeline_cache.remove(key);
    }

    /// Refresh the cached detail for a key already in the queue.
    pub fn cache_pipeline(&self, pipeline: Pipeline) {
        let mut book = self.book.lock().expect("queue bookkeeping lock poisoned");
        book.pipeline_cache.insert(pipeline.queue_key(), pipeline);
    }

    /// One reconciliation tick: walk pending in priority order and admit
    /// whatever passes validation and the external precheck.
    ///
    /// The precheck call and any retry sleep happen without holding the
    /// queue's lock.
    pub async fn reconcile_once(&self) {
        let candidates = self.eq.pending_sorted();
        for Item { key, .. } in candidates {
            // May have been popped out since the snapshot was taken.
            if !self.eq.in_pending(&key) {
                continue;
            }

            let pipeline = {
                let book = self.book.lock().expect("queue bookkeeping lock poisoned");
                book.pipeline_cache.get(&key).cloned()
            };
            let pipeline = match pipeline {
                Some(p) => p,
                None => {
                    // Stale reference: the work item vanished while queued.
                    debug!(queue_id = %self.id, key = %key, "detail missing from cache, dropping stale entry");
                    self.drop_item(&key);
                    continue;
                }
            };

            let (strict, validation) = {
                let config = self.config.read().expect("queue config lock poisoned");
                let outcome = validate_candidate(
                    &config,
                    self.eq.processing_len(),
                    self.resource_in_use(),
                    &pipeline,
                );
                (config.is_strict(), outcome)
            };

            if let Err(failure) = validation {
                warn!(queue_id = %self.id, key = %key, %failure, "admission validation failed");
                self.events.emit(AdmissionEvent::new(
                    &self.id,
                    &key,
                    EventKind::Warning,
                    failure.to_string(),
                ));
                if strict {
                    break;
                }
                continue;
            }

            // External hook, no lock held.
            match self.precheck.check(&pipeline).await {
                PrecheckResult::Admit => {
                    self.admit(&key);
                    if strict {
                        // Resource accounting changed; end this pass and
                        // immediately start a fresh walk from the head.
                        self.kick.notify_one();
                        break;
                    }
                }
                PrecheckResult::NotReady => {
                    // Transient: retried on the next tick, in either mode.
                    debug!(queue_id = %self.id, key = %key, "precheck has no verdict yet");
                }
                PrecheckResult::RetryAfter { interval, reason } => {
                    warn!(
                        queue_id = %self.id,
                        key = %key,
                        retry_after_ms = interval.as_millis() as u64,
                        reason = %reason,
                        "precheck deferred admission"
                    );
                    self.events.emit(AdmissionEvent::new(
                        &self.id,
                        &key,
                        EventKind::Warning,
                        format!("admission deferred: {}", reason),
                    ));
                    // Caller-supplied delay, applied exactly. No lock held.
                    sleep(interval).await;
                    if strict {
                        break;
                    }
                }
                PrecheckResult::Reject { reason } => {
                    error!(queue_id = %self.id, key = %key, reason = %reason, "precheck rejected admission permanently");
                    self.events.emit(AdmissionEvent::new(
                        &self.id,
                        &key,
                        EventKind::Failure,
                        format!("admission rejected: {}", reason),
                    ));
                    if let Err(e) = self
                        .store
                        .update_status(pipeline.id, PipelineStatus::Failed)
                        .await
                    {
                        error!(queue_id = %self.id, key = %key, error = %e, "failed to mark pipeline failed");
                    }
                    self.drop_item(&key);
                    if strict {
                        break;
                    }
                }
            }
        }
    }

    /// Unconditional removal from both pending and processing; used on
    /// cancellation and completion. Idempotent.
    pub async fn pop_out(&self, key: &str, mark_failed: bool) {
        let cached_id = {
            let book = self.book.lock().expect("queue bookkeeping lock poisoned");
            book.pipeline_cache.get(key).map(|p| p.id)
        };
        self.drop_item(key);
        if mark_failed {
            let id = cached_id.or_else(|| key.parse().ok());
            if let Some(id) = id {
                if let Err(e) = self.store.update_status(id, PipelineStatus::Failed).await {
                    error!(queue_id = %self.id, key = %key, error = %e, "failed to mark pipeline failed");
                }
            }
        }
        // The freed slot may admit the next pending candidate.
        self.kick.notify_one();
    }

    /// Read-only usage snapshot, recomputed on demand.
    pub fn usage(&self) -> QueueUsage {
        let config = self.config();
        let book = self.book.lock().expect("queue bookkeeping lock poisoned");
        let describe = |items: Vec<Item>| -> Vec<ItemUsage> {
            items
                .into_iter()
                .map(|item| {
                    let (cpu, mem) = book
                        .pipeline_cache
                        .get(&item.key)
                        .map(|p| (p.requested_cpu, p.requested_memory_mb))
                        .unwrap_or((0.0, 0.0));
                    ItemUsage {
                        key: item.key,
                        priority: item.priority,
                        creation_time_ms: item.creation_time_ms,
                        requested_cpu: cpu,
                        requested_memory_mb: mem,
                    }
                })
                .collect()
        };
        let processing = describe(self.eq.processing_items());
        let pending = describe(self.eq.pending_sorted());
        let in_use_cpu: f64 = processing.iter().map(|i| i.requested_cpu).sum();
        let in_use_memory_mb: f64 = processing.iter().map(|i| i.requested_memory_mb).sum();
        QueueUsage {
            queue_id: config.id,
            processing_window: self.eq.processing_window(),
            in_use_cpu,
            in_use_memory_mb,
            remaining_cpu: config.max_cpu - in_use_cpu,
            remaining_memory_mb: config.max_memory_mb - in_use_memory_mb,
            processing,
            pending,
        }
    }

    /// Run the control loop: one immediate tick, then periodic ticks and
    /// explicit "run now" kicks until shutdown. Idempotent; a second call
    /// is a no-op.
    pub fn start(self: &Arc<Self>, shutdown: ShutdownToken) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(queue_id = %self.id, "control loop already started");
            return;
        }
        let queue = Arc::clone(self);
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            info!(queue_id = %queue.id, "queue control loop started");
            let mut tick = interval(RECONCILE_INTERVAL);
            tick.tick().await; // the interval's immediate first fire
            loop {
                if shutdown.is_shutdown() {
                    break;
                }
                queue.reconcile_once().await;
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = queue.kick.notified() => {}
                    _ = shutdown.wait() => break,
                }
            }
            info!(queue_id = %queue.id, "queue control loop stopped");
        });
    }

    /// Request an immediate reconciliation tick.
    pub fn trigger_now(&self) {
        self.kick.notify_one();
    }

    /// Serialize the underlying enhanced queue's state (warm restart).
    pub fn export_state(&self) -> Result<Vec<u8>> {
        self.eq.export()
    }

    /// Restore the underlying enhanced queue's state, fully replacing
    /// what exists. Done signals and the detail cache are NOT part of the
    /// snapshot; callers re-register waiters after import.
    pub fn import_state(&self, blob: &[u8]) -> Result<()> {
        self.eq.import(blob)
    }

    /// Promote `key` and fire its completion signal.
    fn admit(&self, key: &str) {
        match self.eq.pop_pending_key(key, false) {
            Some(_) => {
                let sender = {
                    let mut book = self.book.lock().expect("queue bookkeeping lock poisoned");
                    book.done_signals.remove(key)
                };
                if let Some(tx) = sender {
                    // Receiver may be gone; signaling after cancellation
                    // is a no-op.
                    let _ = tx.send(());
                }
                info!(queue_id = %self.id, key = %key, "pipeline admitted into processing");
                self.events.emit(AdmissionEvent::new(
                    &self.id,
                    key,
                    EventKind::Success,
                    "admitted into processing",
                ));
            }
            None => {
                // Window filled up or the item was popped out between
                // validation and promotion; retried next tick if pending.
                warn!(queue_id = %self.id, key = %key, "promotion lost eligibility, will retry");
            }
        }
    }

    fn drop_item(&self, key: &str) {
        self.eq.remove(key);
        let mut book = self.book.lock().expect("queue bookkeeping lock poisoned");
        book.pipeline_cache.remove(key);
        // Dropping the sender resolves the waiter with RecvError.
        book.done_signals.remove(key);
    }

    /// Sum of resources reserved by everything currently processing.
    /// Items whose detail was evicted count as zero.
    fn resource_in_use(&self) -> ResourceInUse {
        let book = self.book.lock().expect("queue bookkeeping lock poisoned");
        let mut in_use = ResourceInUse::default();
        for item in self.eq.processing_items() {
            if let Some(p) = book.pipeline_cache.get(&item.key) {
                in_use.add(p.requested_cpu, p.requested_memory_mb);
            }
        }
        in_use
    }
}
