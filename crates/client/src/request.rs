// crates/client/src/request.rs
//! Authenticated request layer.
//!
//! Attaches the current bearer credential, detects authorization failure,
//! refreshes through the single-flight coordinator, and retries exactly
//! once. Business errors are classified, never retried here.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::auth::TokenRefreshCoordinator;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::store::CredentialStore;

pub struct RequestClient {
    http: reqwest::Client,
    api_base: String,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<TokenRefreshCoordinator>,
}

impl RequestClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let http = reqwest::Client::new();
        let coordinator = Arc::new(TokenRefreshCoordinator::new(
            http.clone(),
            &config.api_base,
            Arc::clone(&store),
        ));
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            store,
            coordinator,
        }
    }

    /// The coordinator backing this client, e.g. for subscribing to
    /// session-terminated events.
    pub fn coordinator(&self) -> &Arc<TokenRefreshCoordinator> {
        &self.coordinator
    }

    /// Issue a request against `path` (leading slash, relative to the API
    /// base).
    ///
    /// - 401 with a credential attached: refresh once via the coordinator,
    ///   retry once, then give up — a second 401 after a successful refresh
    ///   is a permission problem, not a retry loop.
    /// - 403: [`ClientError::PermissionDenied`] with the server's reason.
    /// - Other non-success: [`ClientError::Server`]; retrying business
    ///   errors is the caller's call.
    /// - No credential in the store: the request goes out bare and the auth
    ///   dance is skipped entirely.
    ///
    /// No built-in timeout; callers own their deadlines.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.api_base, path);

        // Lock-free snapshot; a concurrent refresh superseding this token is
        // absorbed by the retry below.
        let credential = self.store.get();
        let bearer = credential.as_ref().map(|c| c.access_token.as_str());
        let response = self.send_once(&method, &url, body, bearer).await?;

        if credential.is_none() {
            // Public request: unauthorized/forbidden are plain server errors.
            return classify(response, false).await;
        }

        if response.status() != StatusCode::UNAUTHORIZED {
            return classify(response, true).await;
        }

        tracing::debug!(%url, "unauthorized, refreshing credential");
        let fresh = match self.coordinator.ensure_fresh_credential().await {
            Ok(credential) => credential,
            Err(ClientError::AuthExpired) => {
                // The coordinator's session-terminated signal handles logout.
                return Err(ClientError::permission_denied("session expired"));
            }
            Err(other) => return Err(other),
        };

        let retried = self
            .send_once(&method, &url, body, Some(&fresh.access_token))
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            // Fresh token still refused. Surface, never loop.
            let reason = retried.text().await.unwrap_or_default();
            return Err(ClientError::permission_denied(if reason.is_empty() {
                "unauthorized after refresh".to_string()
            } else {
                reason
            }));
        }
        classify(retried, true).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.execute(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClientError> {
        let response = self.execute(Method::POST, path, body).await?;
        Ok(response.json().await?)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(json) = body {
            request = request.json(json);
        }
        Ok(request.send().await?)
    }
}

/// Map a settled response to the error taxonomy. `authed` is false for
/// public requests, which bypass the permission classification.
async fn classify(
    response: reqwest::Response,
    authed: bool,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if authed && status == StatusCode::FORBIDDEN {
        return Err(ClientError::PermissionDenied {
            reason: if body.is_empty() {
                "forbidden".to_string()
            } else {
                body
            },
        });
    }
    Err(ClientError::Server {
        status: status.as_u16(),
        body,
    })
}
