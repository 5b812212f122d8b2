//! Authentication collaborators.
//!
//! Token validation and user lookup live outside this crate; the
//! orchestrator consumes them through [`Authenticator`] at the façade
//! boundary. An invalid or expired token short-circuits every operation
//! before any orchestrator work happens.

pub(crate) mod identity;

pub use identity::IdentityClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated user, read-only within a request.
///
/// `username` keys the user's cluster records; `tenant_id` keys them instead
/// when resolution runs with admin scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub token: String,
    pub username: String,
    pub tenant_id: String,
    pub token_expiry: DateTime<Utc>,
}

impl User {
    /// Whether the token has already expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry <= now
    }
}

/// Session-token validation and lookup, owned by the embedding service.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the token is known and unexpired.
    async fn is_valid(&self, token: &str) -> Result<bool>;

    /// The user a token belongs to, or `None` for unknown tokens.
    async fn find_by_token(&self, token: &str) -> Result<Option<User>>;
}
