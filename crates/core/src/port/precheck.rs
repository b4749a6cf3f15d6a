// Admission Precheck Port (pluggable veto/delay hook)

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Pipeline;

/// Outcome of one precheck invocation.
///
/// The retry interval is caller-supplied and applied exactly as given;
/// hooks that want backoff encode their own schedule across invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrecheckResult {
    /// Proceed with admission
    Admit,
    /// No verdict yet; skip this tick without popping, retried next tick
    NotReady,
    /// Recoverable veto: sleep `interval`, then resume per queue mode
    RetryAfter { interval: Duration, reason: String },
    /// Terminal veto: mark the pipeline failed and drop it from the queue
    Reject { reason: String },
}

/// Extension point invoked once per admission attempt, for cross-cutting
/// policy the scheduler does not own.
#[async_trait]
pub trait AdmissionPrecheck: Send + Sync {
    async fn check(&self, pipeline: &Pipeline) -> PrecheckResult;
}

/// Default hook: admits everything
pub struct AdmitAll;

#[async_trait]
impl AdmissionPrecheck for AdmitAll {
    async fn check(&self, _pipeline: &Pipeline) -> PrecheckResult {
        PrecheckResult::Admit
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns a scripted sequence of results, then `Admit` forever
    pub struct ScriptedPrecheck {
        script: Mutex<VecDeque<PrecheckResult>>,
        calls: Mutex<usize>,
    }

    impl ScriptedPrecheck {
        pub fn new(script: Vec<PrecheckResult>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl AdmissionPrecheck for ScriptedPrecheck {
        async fn check(&self, _pipeline: &Pipeline) -> PrecheckResult {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PrecheckResult::Admit)
        }
    }
}
