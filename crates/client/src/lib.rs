// crates/client/src/lib.rs
//! AxiomFlow client: the resilient job-progress channel and authenticated
//! request layer.
//!
//! The crate keeps a client's view of server-side job state correct despite
//! unreliable transports, expiring credentials, and concurrent requests
//! racing each other:
//!
//! - [`stream::ProgressStream`] — duplex progress channel per document,
//!   bounded reconnect backoff, callback delivery that never drops an
//!   update silently.
//! - [`auth::TokenRefreshCoordinator`] — turns N concurrent "my credential
//!   expired" failures into exactly one refresh call and propagates the new
//!   credential to every waiter.
//! - [`request::RequestClient`] — attaches the bearer credential, detects
//!   authorization failure, refreshes through the coordinator, retries once.
//! - [`jobs::JobController`] — pause/resume/cancel/retry with client-side
//!   legal-transition guards.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod request;
pub mod store;
pub mod stream;

pub use auth::{AuthSession, SessionEvent, TokenRefreshCoordinator};
pub use config::{ClientConfig, StreamConfig};
pub use error::ClientError;
pub use jobs::{fetch_document_progress, JobController};
pub use request::RequestClient;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use stream::{ConnectionState, ProgressObserver, ProgressStream};
