// crates/types/src/frame.rs
//! Progress-channel wire frames and their typed event form.
//!
//! The server pushes one JSON object per WebSocket text frame:
//!
//! ```json
//! { "type": "progress" | "heartbeat" | "error",
//!   "document_id": "...", "status": "parsing",
//!   "parse_progress": 42.0, "num_pages": 0,
//!   "parse_job": { "id": "...", "stage": "parsing", "progress": 0.42,
//!                  "done": 12, "total": 30, "eta_s": 8.5, "message": "..." } }
//! ```
//!
//! Frames arrive with any subset of fields populated, so every field on the
//! raw structs defaults. [`ProgressEvent::from_frame`] fills the gaps: the
//! shape handed to subscribers is always fully populated.

use serde::Deserialize;

use crate::error::FrameError;

/// Raw inbound frame, exactly as the server serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// 0.0–100.0
    #[serde(default)]
    pub parse_progress: Option<f64>,
    #[serde(default)]
    pub num_pages: Option<u32>,
    #[serde(default)]
    pub parse_job: Option<ParseJobFrame>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Job sub-object embedded in a progress frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseJobFrame {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    /// 0.0–1.0 (job-internal fraction, distinct from `parse_progress`)
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub done: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub eta_s: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Typed progress event delivered to subscribers.
///
/// `percent` is monotonically non-decreasing within one connection epoch;
/// after a reconnect the server may replay the last known value. Consumers
/// treat progress as latest-observed-value, never as a delta stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress {
        job_id: String,
        stage: String,
        /// 0.0–100.0, clamped.
        percent: f64,
        num_pages: u32,
        done: Option<u64>,
        total: Option<u64>,
        eta_seconds: Option<f64>,
        message: Option<String>,
    },
    /// Keep-alive. Consumed by the stream client, never forwarded.
    Heartbeat,
    Error {
        message: String,
    },
}

impl ProgressEvent {
    /// Decode a raw text frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let frame: ProgressFrame =
            serde_json::from_str(text).map_err(|e| FrameError::malformed(&e))?;
        Self::from_frame(frame)
    }

    /// Convert a wire frame into its typed form, substituting safe defaults
    /// for absent fields so subscribers never see a partially-populated shape.
    pub fn from_frame(frame: ProgressFrame) -> Result<Self, FrameError> {
        match frame.kind.as_str() {
            "heartbeat" => Ok(ProgressEvent::Heartbeat),
            "error" => Ok(ProgressEvent::Error {
                message: frame
                    .message
                    .unwrap_or_else(|| "unknown server error".to_string()),
            }),
            "progress" => {
                let job = frame.parse_job;
                let job_id = job
                    .as_ref()
                    .and_then(|j| j.id.clone())
                    .or(frame.document_id)
                    .unwrap_or_default();
                let stage = job
                    .as_ref()
                    .and_then(|j| j.stage.clone())
                    .or(frame.status)
                    .unwrap_or_else(|| "unknown".to_string());
                let percent = frame.parse_progress.unwrap_or(0.0).clamp(0.0, 100.0);
                Ok(ProgressEvent::Progress {
                    job_id,
                    stage,
                    percent,
                    num_pages: frame.num_pages.unwrap_or(0),
                    done: job.as_ref().and_then(|j| j.done),
                    total: job.as_ref().and_then(|j| j.total),
                    eta_seconds: job.as_ref().and_then(|j| j.eta_s),
                    message: job.and_then(|j| j.message).or(frame.message),
                })
            }
            other => Err(FrameError::UnknownKind { kind: other.into() }),
        }
    }

    /// Percent carried by a `Progress` event, if any.
    pub fn percent(&self) -> Option<f64> {
        match self {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        }
    }
}
