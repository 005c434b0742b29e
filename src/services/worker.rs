//! The polling worker.
//!
//! Claims one pending task at a time, runs the label computer over its
//! images and pushes the outcome to the task's callback URL. Every failure
//! is contained at the task boundary; the loop only stops on shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use crate::models::callback::CallbackPayload;
use crate::models::label::LabelResult;
use crate::models::task::{Task, TaskResult};
use crate::services::delivery::{CallbackClient, RetryPolicy};
use crate::services::labeler::{decode_images, validate_labels, ComputationError, LabelComputer};
use crate::store::TaskStore;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub compute_timeout: Duration,
    pub delivery: RetryPolicy,
    /// Tell the caller when labeling fails instead of failing silently.
    pub notify_on_error: bool,
    pub claim_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            compute_timeout: Duration::from_secs(300),
            delivery: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
            },
            notify_on_error: true,
            claim_timeout: Duration::from_secs(3600),
        }
    }
}

/// Idle polls between info-level heartbeats (once a minute at the default
/// 10 s interval). The first idle poll after work is always one.
const HEARTBEAT_POLLS: u32 = 6;

fn is_heartbeat(idle_polls: u32) -> bool {
    idle_polls % HEARTBEAT_POLLS == 0
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Idle,
    Completed { task_id: String, delivered: bool },
    Failed { task_id: String, detail: String },
}

pub struct Worker {
    store: Arc<dyn TaskStore>,
    labeler: Arc<dyn LabelComputer>,
    callbacks: CallbackClient,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        labeler: Arc<dyn LabelComputer>,
        callbacks: CallbackClient,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            labeler,
            callbacks,
            settings,
        }
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.release_stale_claims().await;

        tracing::info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Worker ready, starting task processing loop"
        );

        let mut idle_polls: u32 = 0;
        while !*shutdown.borrow() {
            if self.poll_once().await != PollOutcome::Idle {
                idle_polls = 0;
                continue;
            }

            let idle_secs = self.settings.poll_interval.as_secs() * u64::from(idle_polls);
            if is_heartbeat(idle_polls) {
                // A claim whose completion could not be recorded stays in
                // flight; sweep those while there is nothing else to do.
                tracing::info!(idle_secs, "Worker idle, no pending tasks");
                self.release_stale_claims().await;
            } else {
                tracing::debug!(idle_secs, "No pending tasks, sleeping");
            }
            idle_polls = idle_polls.wrapping_add(1);

            tokio::select! {
                _ = sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    async fn release_stale_claims(&self) {
        match self.store.release_stale_claims(self.settings.claim_timeout).await {
            Ok(0) => {}
            Ok(released) => tracing::warn!(released, "Released stale claims back to pending"),
            Err(e) => tracing::error!(error = %e, "Failed to release stale claims"),
        }
    }

    /// Claim and process at most one task.
    pub async fn poll_once(&self) -> PollOutcome {
        let task = match self.store.claim_next_pending().await {
            Ok(Some(task)) => task,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim task");
                return PollOutcome::Idle;
            }
        };

        tracing::info!(
            task_id = %task.id,
            user_id = %task.request.user_id,
            camera = %task.request.camera,
            images = task.request.images.len(),
            "Processing task"
        );

        let start = Instant::now();
        let outcome = match self.compute(&task).await {
            Ok(labels) => self.finish_success(&task, labels).await,
            Err(e) => self.finish_failure(&task, e).await,
        };
        metrics::histogram!("task_processing_seconds").record(start.elapsed().as_secs_f64());

        outcome
    }

    /// Decode, label and validate. The label computer runs on its own task
    /// so a panic inside it only fails this task.
    async fn compute(&self, task: &Task) -> Result<LabelResult, ComputationError> {
        let images = Arc::new(decode_images(&task.request.images)?);

        let labeler = self.labeler.clone();
        let batch = images.clone();
        let mut handle = tokio::spawn(async move { labeler.compute(&batch).await });

        let labels = match timeout(self.settings.compute_timeout, &mut handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => return Err(ComputationError::Panicked(join_err.to_string())),
            Err(_) => {
                handle.abort();
                return Err(ComputationError::Timeout(self.settings.compute_timeout));
            }
        };

        validate_labels(&labels, &images)?;
        Ok(labels)
    }

    async fn finish_success(&self, task: &Task, labels: LabelResult) -> PollOutcome {
        let payload = CallbackPayload::Success {
            labels: labels.clone(),
        };
        let delivery = self
            .callbacks
            .deliver_with_retry(&task.request.callback_url, &payload, &self.settings.delivery)
            .await;
        let delivered = delivery.delivered;
        let result = TaskResult { labels, delivery };

        match self.store.complete(&task.id, &result).await {
            Ok(()) => {
                metrics::counter!("tasks_completed_total").increment(1);
                if delivered {
                    tracing::info!(task_id = %task.id, "Task completed and delivered");
                } else {
                    tracing::warn!(
                        task_id = %task.id,
                        attempts = result.delivery.attempts,
                        error = result.delivery.last_error.as_deref().unwrap_or_default(),
                        "Task completed but callback delivery failed"
                    );
                }
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to record completion");
            }
        }

        PollOutcome::Completed {
            task_id: task.id.clone(),
            delivered,
        }
    }

    async fn finish_failure(&self, task: &Task, error: ComputationError) -> PollOutcome {
        let detail = error.to_string();
        tracing::error!(task_id = %task.id, error = %detail, "Task processing failed");

        if self.settings.notify_on_error {
            let payload = CallbackPayload::Error {
                detail: detail.clone(),
            };
            self.callbacks
                .deliver_with_retry(&task.request.callback_url, &payload, &self.settings.delivery)
                .await;
        }

        match self.store.fail(&task.id, &detail).await {
            Ok(()) => metrics::counter!("tasks_failed_total").increment(1),
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to record failure");
            }
        }

        PollOutcome::Failed {
            task_id: task.id.clone(),
            detail,
        }
    }
}
