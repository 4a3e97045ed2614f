use axum::{
    Router,
    http::StatusCode,
    response::Response,
    routing::{MethodRouter, get},
};

use careportal_auth::{AuthorizationContext, ProtectedRoute};
use careportal_core::SubjectId;

use crate::app::errors;
use crate::middleware::{self, AuthState};

pub mod provider;
pub mod search_users;
pub mod system;
pub mod user_roles;

/// Router for all authenticated endpoints (mounted under `/api`).
pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route("/whoami", guarded(auth, ProtectedRoute::new("read", "session"), get(system::whoami)))
        .nest("/user-roles", user_roles::router(auth))
        .nest("/search-users", search_users::router(auth))
        .nest("/provider", provider::router(auth))
}

/// Wrap `handler` so it only runs once `route`'s authorization has passed.
pub(crate) fn guarded(auth: &AuthState, route: ProtectedRoute, handler: MethodRouter) -> MethodRouter {
    handler.route_layer(axum::middleware::from_fn_with_state(
        auth.guard(route),
        middleware::authorize,
    ))
}

/// Subject stored under `key` in the request's target.
pub(crate) fn target_subject(context: &AuthorizationContext, key: &str) -> Result<SubjectId, Response> {
    context
        .target()
        .field(key)
        .and_then(|raw| SubjectId::parse(raw).ok())
        .ok_or_else(|| errors::json_error(StatusCode::BAD_REQUEST, "invalid request target"))
}
