// crates/client/src/jobs.rs
//! Job control: pause/resume/cancel/retry plus the fallback polling reads.

use std::sync::{Arc, Mutex};

use axiomflow_types::{DocumentProgress, Job, JobState, RetriedJob};

use crate::error::ClientError;
use crate::request::RequestClient;

/// Per-job control handle.
///
/// Caches the last state observed from a control response or progress event.
/// The cache is a read-through hint for failing obviously-wrong control
/// calls fast; the server owns truth and may still reject anything we send.
pub struct JobController {
    client: Arc<RequestClient>,
    job_id: String,
    last_known: Mutex<Option<JobState>>,
}

impl JobController {
    pub fn new(client: Arc<RequestClient>, job_id: impl Into<String>) -> Self {
        Self {
            client,
            job_id: job_id.into(),
            last_known: Mutex::new(None),
        }
    }

    /// Controller seeded with a known state, e.g. from a job listing.
    pub fn with_state(client: Arc<RequestClient>, job_id: impl Into<String>, state: JobState) -> Self {
        let controller = Self::new(client, job_id);
        controller.note_state(state);
        controller
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn last_known_state(&self) -> Option<JobState> {
        match self.last_known.lock() {
            Ok(guard) => *guard,
            Err(e) => {
                tracing::error!("job state cache lock poisoned: {e}");
                None
            }
        }
    }

    /// Feed a state observed out-of-band (e.g. from a progress event).
    pub fn note_state(&self, state: JobState) {
        match self.last_known.lock() {
            Ok(mut guard) => *guard = Some(state),
            Err(e) => tracing::error!("job state cache lock poisoned: {e}"),
        }
    }

    /// Pause a running job.
    pub async fn pause(&self) -> Result<Job, ClientError> {
        self.guard("pause", JobState::can_pause)?;
        self.control("pause").await
    }

    /// Resume a paused job.
    pub async fn resume(&self) -> Result<Job, ClientError> {
        self.guard("resume", JobState::can_resume)?;
        self.control("resume").await
    }

    /// Cancel any non-terminal job.
    pub async fn cancel(&self) -> Result<Job, ClientError> {
        self.guard("cancel", JobState::can_cancel)?;
        self.control("cancel").await
    }

    /// Retry a failed or cancelled job.
    ///
    /// Retry creates a fresh job — the response carries a NEW job id and this
    /// controller stays bound to the old one. Follow-up progress
    /// subscriptions must target the returned id.
    pub async fn retry(&self) -> Result<RetriedJob, ClientError> {
        self.guard("retry", JobState::can_retry)?;
        let path = format!("/v1/jobs/{}/retry", urlencoding::encode(&self.job_id));
        let retried: RetriedJob = self.client.post_json(&path, None).await?;
        tracing::info!(
            old_job_id = %self.job_id,
            new_job_id = %retried.job_id,
            "job retried as a fresh job"
        );
        Ok(retried)
    }

    /// Fallback polling read: fetch the job's current state and refresh the
    /// cache. For callers whose stream subscription could not be established.
    pub async fn fetch(&self) -> Result<Job, ClientError> {
        let path = format!("/v1/jobs/{}", urlencoding::encode(&self.job_id));
        let job: Job = self.client.get_json(&path).await?;
        self.note_state(job.state);
        Ok(job)
    }

    /// Fail fast on a transition the cached state already rules out. An
    /// unknown cached state passes through — the server validates anyway.
    fn guard(&self, op: &'static str, allowed: fn(JobState) -> bool) -> Result<(), ClientError> {
        if let Some(state) = self.last_known_state() {
            if !allowed(state) {
                return Err(ClientError::InvalidTransition { from: state, op });
            }
        }
        Ok(())
    }

    async fn control(&self, op: &str) -> Result<Job, ClientError> {
        let path = format!("/v1/jobs/{}/{}", urlencoding::encode(&self.job_id), op);
        let job: Job = self.client.post_json(&path, None).await?;
        self.note_state(job.state);
        Ok(job)
    }
}

/// Document-level fallback poll, for callers whose stream subscription
/// ultimately failed.
pub async fn fetch_document_progress(
    client: &RequestClient,
    document_id: &str,
) -> Result<DocumentProgress, ClientError> {
    client
        .get_json(&format!(
            "/v1/documents/{}/progress",
            urlencoding::encode(document_id)
        ))
        .await
}
