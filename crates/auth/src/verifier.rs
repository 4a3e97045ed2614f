//! Bearer credential verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use careportal_core::SubjectId;

use crate::claims::{TokenClaims, validate_claims};
use crate::identity::Identity;

/// Scheme prefix expected at the start of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Verification failure.
///
/// The variants are distinguished internally (logs, tests) but both map to
/// the same generic "not authorized" outcome for callers; which check failed
/// (signature, expiry, structure) is never carried here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential")]
    InvalidCredential,
}

impl AuthError {
    pub fn public_message(&self) -> &'static str {
        "not authorized"
    }
}

/// Verifies a raw `Authorization` header value and yields an [`Identity`].
///
/// Implementations must be pure functions of the header and their configured
/// key material (no IO, no shared mutable state).
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, raw_header: &str) -> Result<Identity, AuthError>;
}

/// Optional claim checks on top of signature and expiry.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// HS256 shared-secret verifier.
#[derive(Clone)]
pub struct Hs256TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_config(secret, VerifierConfig::default())
    }

    pub fn with_config(secret: impl AsRef<[u8]>, config: VerifierConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Verify against an explicit clock (used by tests and by [`TokenVerifier::verify`]).
    pub fn verify_at(&self, raw_header: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let token = extract_bearer(raw_header)?;

        let claims = decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "bearer token rejected");
                AuthError::InvalidCredential
            })?
            .claims;

        validate_claims(&claims, now).map_err(|e| {
            tracing::debug!(reason = %e, "bearer token rejected");
            AuthError::InvalidCredential
        })?;

        let subject = SubjectId::parse(claims.sub.clone()).map_err(|e| {
            tracing::debug!(reason = %e, "bearer token rejected");
            AuthError::InvalidCredential
        })?;

        Ok(Identity::new(subject, claims.role_set()))
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(&self, raw_header: &str) -> Result<Identity, AuthError> {
        self.verify_at(raw_header, Utc::now())
    }
}

impl core::fmt::Debug for Hs256TokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

fn extract_bearer(raw_header: &str) -> Result<&str, AuthError> {
    let token = raw_header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MissingCredential)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    Ok(token)
}
