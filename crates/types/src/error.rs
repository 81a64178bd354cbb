// crates/types/src/error.rs
use thiserror::Error;

/// Errors produced while decoding inbound progress frames.
///
/// These never cross the subscriber boundary: the stream client logs the
/// offending frame and drops it, keeping the connection alive.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {message}")]
    Malformed { message: String },

    #[error("unknown frame type: {kind}")]
    UnknownKind { kind: String },
}

impl FrameError {
    pub fn malformed(source: &serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
        }
    }
}
