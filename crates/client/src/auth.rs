// crates/client/src/auth.rs
//! Single-flight token refresh and session lifecycle.
//!
//! Any number of concurrent callers observing an expired access token share
//! exactly one refresh network call: the first caller installs a shared
//! future in the coordinator's slot, everyone else clones it and awaits the
//! same outcome. The credential store is only written from inside that
//! single flight, which serializes all credential persistence.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde::Deserialize;
use tokio::sync::broadcast;

use axiomflow_types::{Credential, User};

use crate::error::ClientError;
use crate::store::CredentialStore;

/// Session-level notifications emitted by the coordinator.
///
/// Replaces the original UI's ambient window-event bus: interested parties
/// (a logout handler, a toast surface) subscribe explicitly via
/// [`TokenRefreshCoordinator::subscribe_session_events`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The refresh token was rejected; the session is over. Emitted exactly
    /// once per expiry event regardless of how many requests failed.
    Terminated { reason: String },
}

/// `POST /v1/auth/refresh` and `POST /v1/auth/login` both answer with this.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
    /// Seconds until the access token expires. Advisory.
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Refresh outcome shared between all waiters. Must be `Clone` so the
/// shared future can hand it to every caller.
#[derive(Debug, Clone)]
enum RefreshFailure {
    AuthExpired,
    Network(String),
}

impl From<RefreshFailure> for ClientError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::AuthExpired => ClientError::AuthExpired,
            RefreshFailure::Network(message) => ClientError::Network { message },
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Credential, RefreshFailure>>>;

/// Deduplicates concurrent refresh attempts into a single in-flight
/// operation and propagates the result to every waiter.
pub struct TokenRefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    /// `None` when idle, the shared in-flight future otherwise. Invariant:
    /// while `Some`, every caller attaches here instead of starting a
    /// second network operation.
    in_flight: Mutex<Option<SharedRefresh>>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl TokenRefreshCoordinator {
    pub fn new(http: reqwest::Client, api_base: &str, store: Arc<dyn CredentialStore>) -> Self {
        let (session_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                refresh_url: format!("{}/v1/auth/refresh", api_base.trim_end_matches('/')),
                store,
                in_flight: Mutex::new(None),
                session_tx,
            }),
        }
    }

    /// Subscribe to session lifecycle notifications.
    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.session_tx.subscribe()
    }

    /// Obtain a freshly-minted credential, joining an in-flight refresh if
    /// one exists.
    ///
    /// Fails with [`ClientError::AuthExpired`] when the refresh token itself
    /// is invalid; network trouble during the refresh surfaces as
    /// [`ClientError::Network`] and does not terminate the session.
    pub async fn ensure_fresh_credential(&self) -> Result<Credential, ClientError> {
        let shared = {
            let mut slot = match self.inner.in_flight.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::error!("refresh slot lock poisoned: {e}");
                    e.into_inner()
                }
            };
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fut = Self::refresh_flight(Arc::clone(&self.inner)).boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        shared.await.map_err(ClientError::from)
    }

    /// The single flight: performs the network refresh, applies its side
    /// effects, then frees the slot so a later expiry starts a new flight.
    async fn refresh_flight(inner: Arc<CoordinatorInner>) -> Result<Credential, RefreshFailure> {
        let Some(current) = inner.store.get() else {
            // The store is already empty: a failed flight or a logout got
            // here first and the terminated signal has already fired. Fail
            // the waiters without touching the network or re-signalling.
            Self::free_slot(&inner);
            return Err(RefreshFailure::AuthExpired);
        };

        let result = Self::do_refresh(&inner, &current.refresh_token).await;
        match &result {
            Ok(credential) => {
                // Preserve the durability choice recorded at login.
                inner.store.set(credential.clone(), inner.store.durable());
                tracing::debug!("credential refreshed");
            }
            Err(RefreshFailure::AuthExpired) => {
                inner.store.clear();
                let _ = inner.session_tx.send(SessionEvent::Terminated {
                    reason: "refresh token rejected".to_string(),
                });
                tracing::warn!("refresh token rejected, session terminated");
            }
            Err(RefreshFailure::Network(message)) => {
                tracing::warn!(error = %message, "token refresh failed on the wire");
            }
        }
        Self::free_slot(&inner);
        result
    }

    fn free_slot(inner: &CoordinatorInner) {
        match inner.in_flight.lock() {
            Ok(mut slot) => *slot = None,
            Err(e) => tracing::error!("refresh slot lock poisoned: {e}"),
        }
    }

    async fn do_refresh(
        inner: &CoordinatorInner,
        refresh_token: &str,
    ) -> Result<Credential, RefreshFailure> {
        let response = inner
            .http
            .post(&inner.refresh_url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(RefreshFailure::AuthExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshFailure::Network(format!(
                "refresh failed with {status}: {body}"
            )));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;
        Ok(credential_from_response(body))
    }
}

/// Login/logout over the same auth surface.
///
/// Login seeds the credential store (with the caller's "remember me"
/// durability choice); logout clears it. Everything in between is the
/// coordinator's business.
pub struct AuthSession {
    http: reqwest::Client,
    login_url: String,
    store: Arc<dyn CredentialStore>,
}

impl AuthSession {
    pub fn new(http: reqwest::Client, api_base: &str, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            login_url: format!("{}/v1/auth/login", api_base.trim_end_matches('/')),
            store,
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<User, ClientError> {
        let response = self
            .http
            .post(&self.login_url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::permission_denied(if body.is_empty() {
                "invalid email or password".to_string()
            } else {
                body
            }));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body: AuthResponse = response.json().await?;
        let user = body.user.clone();
        self.store.set(credential_from_response(body), remember);
        user.ok_or_else(|| ClientError::Server {
            status: status.as_u16(),
            body: "login response missing user".to_string(),
        })
    }

    pub fn logout(&self) {
        self.store.clear();
        tracing::info!("logged out, credential cleared");
    }
}

fn credential_from_response(body: AuthResponse) -> Credential {
    let mut credential = Credential::new(body.token, body.refresh_token.unwrap_or_default());
    if let Some(secs) = body.expires_in {
        credential.expires_hint = Some(Utc::now() + chrono::Duration::seconds(secs as i64));
    }
    credential
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    #[tokio::test]
    async fn test_refresh_without_credential_is_auth_expired() {
        // Empty store: the coordinator must fail fast without touching the
        // network (the URL below is never resolved), and without a second
        // terminated signal — whoever emptied the store already sent one.
        let store = Arc::new(MemoryCredentialStore::new());
        let coordinator =
            TokenRefreshCoordinator::new(reqwest::Client::new(), "http://127.0.0.1:1", store);

        let mut events = coordinator.subscribe_session_events();
        let err = coordinator.ensure_fresh_credential().await.unwrap_err();
        assert!(matches!(err, ClientError::AuthExpired));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slot_freed_after_failed_flight() {
        let store = Arc::new(MemoryCredentialStore::new());
        let coordinator =
            TokenRefreshCoordinator::new(reqwest::Client::new(), "http://127.0.0.1:1", store);

        coordinator.ensure_fresh_credential().await.unwrap_err();
        // A later expiry starts a fresh flight instead of awaiting a corpse.
        assert!(coordinator.inner.in_flight.lock().unwrap().is_none());
        coordinator.ensure_fresh_credential().await.unwrap_err();
    }

    #[test]
    fn test_credential_from_response_carries_expiry_hint() {
        let body = AuthResponse {
            token: "acc".into(),
            refresh_token: Some("ref".into()),
            user: None,
            expires_in: Some(3600),
        };
        let credential = credential_from_response(body);
        assert_eq!(credential.access_token, "acc");
        assert_eq!(credential.refresh_token, "ref");
        assert!(credential.expires_hint.is_some());
    }
}
