// crates/client/src/error.rs
use axiomflow_types::JobState;
use thiserror::Error;

/// Error taxonomy for every operation the client issues.
///
/// Propagation policy: transport and refresh failures are handled locally up
/// to the retry/backoff limits; once exhausted they surface here as terminal
/// errors. Nothing in this crate retries silently forever.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure. Retryable by the caller.
    #[error("network error: {message}")]
    Network { message: String },

    /// The refresh token itself was rejected. Fatal to the session; the
    /// coordinator has already emitted its session-terminated signal.
    #[error("session expired: refresh token rejected")]
    AuthExpired,

    /// Authenticated but not permitted. Never retried.
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// Business-logic failure; whether to retry is the caller's decision.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Client-side transition guard tripped; no network call was made.
    #[error("cannot {op} a {from} job")]
    InvalidTransition { from: JobState, op: &'static str },
}

impl ClientError {
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(source: reqwest::Error) -> Self {
        Self::Network {
            message: source.to_string(),
        }
    }
}
