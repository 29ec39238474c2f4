//! Submission and polling state machine for content-generation jobs.
//!
//! One orchestrator backs one creation form: it owns at most one active
//! [`JobHandle`] and at most one polling task at a time. Submitting again,
//! retrying, or resetting tears the previous poller down first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use garde::Validate;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::AppConfig;
use crate::models::job::{JobHandle, JobRequest, JobStatus};
use crate::services::api::{ApiClient, ApiError, JobStatusResponse};

/// Shown when a status poll cannot reach the backend. The poll is not
/// retried; a stuck network surfaces here instead of masking a dead job.
const POLL_FAILURE_MESSAGE: &str = "Failed to fetch job status.";

/// Shown when the backend reports failure without an error message.
const JOB_FAILURE_FALLBACK: &str = "Job failed. Please try again.";

/// Observable state of the form's remote operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Active(JobHandle),
}

impl JobState {
    pub fn handle(&self) -> Option<&JobHandle> {
        match self {
            JobState::Idle => None,
            JobState::Active(handle) => Some(handle),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// Request rejected before submission; never sent to the backend.
    #[error("invalid request: {0}")]
    Invalid(#[from] garde::Report),

    /// The enqueue endpoint answered with an error message.
    #[error("{0}")]
    Backend(String),

    /// The enqueue endpoint was unreachable.
    #[error("Failed to enqueue job. Please try again.")]
    Transport(#[source] ApiError),

    /// `retry()` without a failed submission to replay.
    #[error("no failed submission to retry")]
    NothingToRetry,
}

/// Submits a [`JobRequest`] to the remote queue and tracks it to a terminal
/// state, exposing progress through a watch subscription.
pub struct JobOrchestrator {
    api: Arc<ApiClient>,
    poll_interval: Duration,
    state: watch::Sender<JobState>,
    poller: Mutex<Option<JoinHandle<()>>>,
    last_request: Mutex<Option<JobRequest>>,
}

impl JobOrchestrator {
    pub fn new(api: Arc<ApiClient>, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            api,
            poll_interval,
            state,
            poller: Mutex::new(None),
            last_request: Mutex::new(None),
        }
    }

    pub fn from_config(api: Arc<ApiClient>, config: &AppConfig) -> Self {
        Self::new(api, config.poll_interval())
    }

    /// Latest observable state.
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Subscription for UI updates.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Validate and submit a request. On success the returned job id is
    /// already being polled. The request is remembered for `retry()` even
    /// when the enqueue itself fails.
    pub async fn submit(&self, request: JobRequest) -> Result<String, EnqueueError> {
        request.validate()?;
        self.submit_inner(request).await
    }

    /// Replay the last submitted request without re-validation. Available
    /// after the job reached `failed` or after the enqueue itself failed.
    pub async fn retry(&self) -> Result<String, EnqueueError> {
        let replay = {
            let guard = self.last_request.lock().expect("request lock poisoned");
            let replayable = match &*self.state.borrow() {
                JobState::Idle => true,
                JobState::Active(handle) => handle.status == JobStatus::Failed,
            };
            match (&*guard, replayable) {
                (Some(request), true) => request.clone(),
                _ => return Err(EnqueueError::NothingToRetry),
            }
        };
        self.submit_inner(replay).await
    }

    async fn submit_inner(&self, request: JobRequest) -> Result<String, EnqueueError> {
        // One poller per orchestrator: the predecessor goes away before
        // anything else happens.
        self.stop_poller();
        self.state.send_replace(JobState::Idle);
        *self.last_request.lock().expect("request lock poisoned") = Some(request.clone());

        let enqueued = self.api.enqueue(&request).await.map_err(|err| match err {
            ApiError::Backend(message) => EnqueueError::Backend(message),
            other => EnqueueError::Transport(other),
        })?;

        let job_id = enqueued.job_id;
        tracing::info!(job_id = %job_id, prompt = %request.prompt, "job queued");
        metrics::counter!("content_jobs_submitted").increment(1);

        self.state
            .send_replace(JobState::Active(JobHandle::queued(job_id.clone())));
        self.spawn_poller(job_id.clone());
        Ok(job_id)
    }

    /// Stop any active polling and discard the current handle. Safe to call
    /// at any point, including mid-poll.
    pub fn reset(&self) {
        self.stop_poller();
        *self.last_request.lock().expect("request lock poisoned") = None;
        self.state.send_replace(JobState::Idle);
    }

    fn stop_poller(&self) {
        if let Some(task) = self.poller.lock().expect("poller lock poisoned").take() {
            task.abort();
        }
    }

    fn spawn_poller(&self, job_id: String) {
        let api = Arc::clone(&self.api);
        let state = self.state.clone();
        let interval = self.poll_interval;
        let task = tokio::spawn(poll_job(api, state, job_id, interval));
        *self.poller.lock().expect("poller lock poisoned") = Some(task);
    }
}

/// Polls the status endpoint until the handle reaches a terminal state.
async fn poll_job(
    api: Arc<ApiClient>,
    state: watch::Sender<JobState>,
    job_id: String,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the first status check happens one period
    // after enqueue.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match api.job_status(&job_id).await {
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "status poll failed");
                metrics::counter!("content_jobs_failed").increment(1);
                state.send_modify(|current| {
                    if let JobState::Active(handle) = current {
                        handle.status = JobStatus::Failed;
                        handle.error = Some(POLL_FAILURE_MESSAGE.to_string());
                    }
                });
                return;
            }
            Ok(response) => {
                if apply_poll_response(&state, &job_id, response) {
                    return;
                }
            }
        }
    }
}

/// Fold one poll response into the observable handle. Returns true when the
/// job reached a terminal state and polling must stop.
fn apply_poll_response(
    state: &watch::Sender<JobState>,
    job_id: &str,
    response: JobStatusResponse,
) -> bool {
    let Some(status) = response.status else {
        tracing::debug!(job_id, "poll response without a recognizable status");
        return false;
    };

    let mut stop = false;
    let mut reached = None;
    state.send_modify(|current| {
        let JobState::Active(handle) = current else {
            // The form was reset while the response was in flight.
            stop = true;
            return;
        };
        if status.rank() < handle.status.rank() {
            tracing::debug!(job_id, from = ?handle.status, to = ?status, "ignoring backward status report");
            return;
        }
        handle.status = status;
        match status {
            JobStatus::Completed => {
                handle.result = response.extract_result();
                stop = true;
                reached = Some(status);
            }
            JobStatus::Failed => {
                handle.error = Some(
                    response
                        .extract_error()
                        .unwrap_or_else(|| JOB_FAILURE_FALLBACK.to_string()),
                );
                stop = true;
                reached = Some(status);
            }
            JobStatus::Queued | JobStatus::InProgress => {}
        }
    });

    match reached {
        Some(JobStatus::Completed) => {
            tracing::info!(job_id, "job completed");
            metrics::counter!("content_jobs_completed").increment(1);
        }
        Some(JobStatus::Failed) => {
            tracing::warn!(job_id, "job failed");
            metrics::counter!("content_jobs_failed").increment(1);
        }
        _ => {}
    }
    stop
}
