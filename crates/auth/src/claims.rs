use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use careportal_core::{Role, RoleSet};

/// Clock skew tolerated when checking `iat`, in seconds.
const IAT_LEEWAY_SECS: i64 = 60;

/// Claims the portal reads from a bearer token.
///
/// Signature verification happens before these are deserialized; see
/// [`crate::Hs256TokenVerifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / principal identifier.
    pub sub: String,

    /// Roles granted to the subject, as minted by the portal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Roles as minted by the managed user pool (group memberships).
    #[serde(default, rename = "cognito:groups", skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// Expiration (seconds since the epoch).
    pub exp: i64,

    /// Issued-at (seconds since the epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// Roles claim, falling back to the pool's group claim; empty when neither is present.
    pub fn role_set(&self) -> RoleSet {
        let names = match (&self.roles, &self.groups) {
            (Some(roles), _) if !roles.is_empty() => roles,
            (_, Some(groups)) => groups,
            (Some(roles), None) => roles,
            (None, None) => return RoleSet::new(),
        };
        names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .map(|n| Role::new(n.clone()))
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of already-decoded claims.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now + IAT_LEEWAY_SECS < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
