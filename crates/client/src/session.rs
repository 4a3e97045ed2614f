use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("silent refresh failed: {0}")]
    RefreshFailed(String),
}

/// Source of the session's bearer credential (the identity provider's
/// client-side session).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current token, if the session has one.
    async fn token(&self) -> Result<Option<String>, SessionError>;

    /// Non-interactive renewal. Returns the new token, whose claims reflect the
    /// directory's current memberships.
    async fn refresh_silently(&self) -> Result<String, SessionError>;
}
