//! `careportal-auth` — authentication and authorization-context boundary.
//!
//! This crate is intentionally decoupled from HTTP frameworks and storage:
//! the API layer feeds it a raw `Authorization` header and a [`RequestView`],
//! and gets back a verified [`Identity`] and an [`AuthorizationContext`].

pub mod claims;
pub mod context;
pub mod identity;
pub mod policy;
pub mod route;
pub mod verifier;

pub use careportal_core::{Role, RoleSet, SubjectId};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use context::{AuthorizationContext, RequestView, TargetRef};
pub use identity::Identity;
pub use policy::{AllowAuthenticated, Decision, PolicyDecisionPoint, Requirement, RoleRulePolicy};
pub use route::{BadTarget, ProtectedRoute, TargetExtractor, body_subject, path_subject, query_subject};
pub use verifier::{AuthError, BEARER_PREFIX, Hs256TokenVerifier, TokenVerifier, VerifierConfig};
