//! Rate-limited background queue for enrichment tasks.
//!
//! The worker takes up to `batch_size` tasks, runs them concurrently, waits for
//! the whole batch to finish, then pauses before taking the next batch. This
//! caps both the number of concurrent requests and the sustained request rate
//! against the remote API.

use super::EnrichmentTask;
use crate::api_client::EnrichmentFetchError;
use crate::configuration::EnrichmentSettings;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

/// Runs a single enrichment task. Returned tasks are queued as follow-ups.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        task: &EnrichmentTask,
    ) -> Result<Vec<EnrichmentTask>, EnrichmentFetchError>;
}

/// Upper bound on concurrent lookups, whatever the configuration says.
pub const MAX_BATCH_SIZE: usize = 5;

/// Lower bound on the pause between batches.
pub const MIN_BATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub pause: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pause: MIN_BATCH_PAUSE,
        }
    }
}

impl From<&EnrichmentSettings> for QueueSettings {
    fn from(settings: &EnrichmentSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            pause: settings.pause(),
        }
    }
}

impl QueueSettings {
    /// Pulls the settings into the range the remote API tolerates.
    fn clamped(self) -> Self {
        let clamped = Self {
            batch_size: self.batch_size.clamp(1, MAX_BATCH_SIZE),
            pause: self.pause.max(MIN_BATCH_PAUSE),
        };
        if clamped != self {
            warn!(
                batch_size = clamped.batch_size,
                pause_ms = clamped.pause.as_millis() as u64,
                "Enrichment pacing limited"
            );
        }
        clamped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    pub batches: usize,
}

impl QueueStatus {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }

    /// Tasks accepted so far, finished or not.
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.completed + self.failed
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<EnrichmentTask>,
    /// Every task ever accepted; a task is never run twice.
    seen: HashSet<EnrichmentTask>,
    status: QueueStatus,
}

pub struct EnrichmentQueue {
    state: Mutex<QueueState>,
    wakeup: Notify,
    status: watch::Sender<QueueStatus>,
    settings: QueueSettings,
}

impl EnrichmentQueue {
    pub fn new(settings: QueueSettings) -> Arc<Self> {
        let (status, _) = watch::channel(QueueStatus::default());
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            wakeup: Notify::new(),
            status,
            settings: settings.clamped(),
        })
    }

    /// Queues `task` unless the same task was queued before. Returns whether it
    /// was accepted.
    pub fn enqueue(&self, task: EnrichmentTask) -> bool {
        let accepted = Self::accept(&mut self.lock(), task);
        if accepted {
            self.publish();
            self.wakeup.notify_one();
        }
        accepted
    }

    fn accept(state: &mut QueueState, task: EnrichmentTask) -> bool {
        if !state.seen.insert(task.clone()) {
            return false;
        }
        state.pending.push_back(task);
        state.status.pending += 1;
        true
    }

    pub fn status(&self) -> QueueStatus {
        self.lock().status
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.status.subscribe()
    }

    /// Resolves once nothing is pending or running.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this can't fail.
        let _ = rx.wait_for(QueueStatus::is_idle).await;
    }

    /// Starts the worker loop on the tokio runtime. It runs until the runtime
    /// shuts down; tasks still in flight at that point are abandoned.
    pub fn spawn<E>(self: &Arc<Self>, executor: Arc<E>) -> JoinHandle<()>
    where
        E: TaskExecutor + 'static,
    {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run(executor).await })
    }

    async fn run<E>(self: Arc<Self>, executor: Arc<E>)
    where
        E: TaskExecutor + 'static,
    {
        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                self.wakeup.notified().await;
                continue;
            }

            self.run_batch(&executor, batch).await;
            tokio::time::sleep(self.settings.pause).await;
        }
    }

    fn take_batch(&self) -> Vec<EnrichmentTask> {
        let batch: Vec<EnrichmentTask> = {
            let mut state = self.lock();
            let size = self.settings.batch_size.min(state.pending.len());
            let batch: Vec<_> = state.pending.drain(..size).collect();
            state.status.pending -= batch.len();
            state.status.in_flight += batch.len();
            if !batch.is_empty() {
                state.status.batches += 1;
            }
            batch
        };

        if !batch.is_empty() {
            self.publish();
        }
        batch
    }

    async fn run_batch<E>(&self, executor: &Arc<E>, batch: Vec<EnrichmentTask>)
    where
        E: TaskExecutor + 'static,
    {
        debug!(size = batch.len(), "Starting enrichment batch");

        let mut tasks = JoinSet::new();
        for task in batch {
            let executor = Arc::clone(executor);
            tasks.spawn(async move {
                let result = executor.execute(&task).await;
                (task, result)
            });
        }

        let mut follow_ups = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(more))) => {
                    succeeded += 1;
                    follow_ups.extend(more);
                }
                Ok((task, Err(e))) => {
                    failed += 1;
                    warn!(%task, error = %e, "Enrichment task failed");
                }
                Err(e) => {
                    failed += 1;
                    error!(error = %e, "Enrichment task panicked");
                }
            }
        }

        self.finish_batch(succeeded, failed, follow_ups);
    }

    /// Settles a finished batch and queues its follow-ups in one step, so no
    /// published status shows the queue idle while follow-ups are waiting.
    fn finish_batch(
        &self,
        succeeded: usize,
        failed: usize,
        follow_ups: Vec<EnrichmentTask>,
    ) -> QueueStatus {
        let (status, accepted) = {
            let mut state = self.lock();
            state.status.in_flight -= succeeded + failed;
            state.status.completed += succeeded;
            state.status.failed += failed;

            let mut accepted = false;
            for task in follow_ups {
                accepted |= Self::accept(&mut state, task);
            }
            (state.status, accepted)
        };

        self.status.send_replace(status);
        if accepted {
            self.wakeup.notify_one();
        }
        status
    }

    fn publish(&self) {
        let status = self.lock().status;
        self.status.send_replace(status);
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
