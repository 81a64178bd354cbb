// crates/types/src/job.rs
//! Job lifecycle state machine and the control-endpoint payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::ParseJobFrame;

/// Server-side lifecycle of a document-processing job.
///
/// The server owns truth; clients cache the last observed state and use it
/// only to fail obviously-wrong control calls fast (see the `can_*`
/// predicates). `Cancelling` is the window between a cancel request being
/// accepted and the worker actually stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Cancelling,
    Cancelled,
    Failed,
    Succeeded,
}

impl JobState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Failed | JobState::Succeeded
        )
    }

    /// `pause` is only legal while the job is running.
    pub fn can_pause(self) -> bool {
        self == JobState::Running
    }

    /// `resume` is only legal from an explicit pause.
    pub fn can_resume(self) -> bool {
        self == JobState::Paused
    }

    /// `cancel` is legal from any non-terminal state (cancelling twice is
    /// idempotent server-side, but the client gains nothing by re-sending).
    pub fn can_cancel(self) -> bool {
        !self.is_terminal() && self != JobState::Cancelling
    }

    /// `retry` spawns a fresh job; only meaningful once this one is dead.
    pub fn can_retry(self) -> bool {
        matches!(self, JobState::Failed | JobState::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Cancelling => "cancelling",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
            JobState::Succeeded => "succeeded",
        };
        f.write_str(s)
    }
}

/// Job payload returned by the control and polling endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub document_id: String,
    pub state: JobState,
    /// 0.0–1.0 job-internal fraction.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub done: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub eta_s: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response of `POST /v1/jobs/{id}/retry`.
///
/// Retry creates a fresh job rather than reviving the failed one in place —
/// the partial state of the dead job is not assumed recoverable. Subsequent
/// progress subscriptions must target this new id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetriedJob {
    pub job_id: String,
}

/// Fallback-polling payload: `GET /v1/documents/{id}/progress`.
///
/// Used by callers when the streaming channel cannot be established at all.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentProgress {
    pub document_id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// 0.0–100.0
    #[serde(default)]
    pub parse_progress: f64,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub parse_job: Option<ParseJobFrame>,
}
