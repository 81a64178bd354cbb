// crates/types/src/lib.rs
//! Shared wire and domain types for the AxiomFlow client.
//!
//! Everything here is plain data: the progress-channel frames, the job
//! state machine, credentials, and the frame-decoding error type. No I/O
//! lives in this crate.

pub mod credential;
pub mod error;
pub mod frame;
pub mod job;

pub use credential::{Credential, User};
pub use error::FrameError;
pub use frame::{ParseJobFrame, ProgressEvent, ProgressFrame};
pub use job::{DocumentProgress, Job, JobState, RetriedJob};
