// crates/types/src/credential.rs
//! Bearer credential pair and the user profile returned by the auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair.
///
/// Owned exclusively by the credential store. The request client and the
/// refresh coordinator hold transient clones for the duration of a single
/// operation; a request in flight may legally carry a credential that is
/// concurrently being superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Server hint for access-token expiry. Advisory only — expiry is
    /// always detected authoritatively via a 401 response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_hint: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_hint: None,
        }
    }
}

/// User profile carried alongside tokens in auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// "email", "google", "github", ...
    #[serde(default)]
    pub provider: Option<String>,
}
