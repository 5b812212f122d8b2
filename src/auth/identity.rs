use super::User;
use crate::error::{transport_error, Error, Result};
use crate::REMOTE_TIMEOUT;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for the identity federation endpoint: exchanges username/password
/// for a token, tenant id, and expiry over HTTPS JSON.
///
/// A 401/404 from the provider means "unknown or unauthenticated" and maps to
/// [`Error::Auth`]; any other non-success is an upstream failure. One attempt
/// per call, bounded by the fixed remote timeout.
pub struct IdentityClient {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    tenant_id: String,
    expires_at: DateTime<Utc>,
}

impl IdentityClient {
    /// Create a client for an identity provider base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Exchange credentials for an authenticated [`User`].
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let url = format!("{}/tokens", self.base_url);
        debug!(username, "requesting token from identity provider");

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest { username, password })
            .send()
            .await
            .map_err(|e| transport_error("identity login", e))?;

        match response.status() {
            status if status.is_success() => {
                let body: TokenResponse = response.json().await.map_err(|e| {
                    Error::Provision(format!("identity provider returned invalid JSON: {e}"))
                })?;
                Ok(User {
                    token: body.token,
                    username: username.to_string(),
                    tenant_id: body.tenant_id,
                    token_expiry: body.expires_at,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Err(Error::Auth(format!(
                "identity provider rejected credentials for '{username}'"
            ))),
            status => Err(Error::Provision(format!(
                "identity provider returned {status}"
            ))),
        }
    }
}
