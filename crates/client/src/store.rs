// crates/client/src/store.rs
//! Credential store contract and the in-memory default.

use std::sync::RwLock;

use axiomflow_types::Credential;

/// Holds the current access/refresh credential pair.
///
/// The store is the only shared-write resource in the client: writes happen
/// exclusively inside the refresh coordinator's single-flight critical
/// section or at login/logout. Reads for attaching a token to an outgoing
/// request are lock-free snapshots — a request in flight may carry a
/// credential that is concurrently superseded, which the retry-once-after-
/// refresh contract absorbs.
///
/// `durable` records whether the user asked to be remembered; persisted
/// backends use it to choose between long-lived and session-scoped storage.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: Credential, durable: bool);
    fn clear(&self);
    /// Durability choice recorded by the most recent `set`.
    fn durable(&self) -> bool;
}

/// Session-scoped in-memory store. The default when no persisted backend is
/// wired in, and the store used throughout the test suite.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    credential: Option<Credential>,
    durable: bool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a credential, session-scoped.
    pub fn with_credential(credential: Credential) -> Self {
        let store = Self::new();
        store.set(credential, false);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        match self.inner.read() {
            Ok(guard) => guard.credential.clone(),
            Err(e) => {
                tracing::error!("credential store lock poisoned on read: {e}");
                None
            }
        }
    }

    fn set(&self, credential: Credential, durable: bool) {
        match self.inner.write() {
            Ok(mut guard) => {
                guard.credential = Some(credential);
                guard.durable = durable;
            }
            Err(e) => tracing::error!("credential store lock poisoned on write: {e}"),
        }
    }

    fn clear(&self) {
        match self.inner.write() {
            Ok(mut guard) => {
                guard.credential = None;
                guard.durable = false;
            }
            Err(e) => tracing::error!("credential store lock poisoned on clear: {e}"),
        }
    }

    fn durable(&self) -> bool {
        match self.inner.read() {
            Ok(guard) => guard.durable,
            Err(e) => {
                tracing::error!("credential store lock poisoned on read: {e}");
                false
            }
        }
    }
}
