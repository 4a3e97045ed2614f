//! Per-route authorization.
//!
//! Each protected route is wrapped with [`authorize`] and its own
//! [`ProtectedRoute`] declaration. The middleware verifies the bearer
//! credential, builds the [`AuthorizationContext`] from the route's fixed
//! action/resource plus the extracted target, asks the policy decision point,
//! and only then hands the request (with the context as an extension) to the
//! handler.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use careportal_auth::{
    AuthorizationContext, Decision, Hs256TokenVerifier, PolicyDecisionPoint, ProtectedRoute, RequestView,
    RoleRulePolicy, TokenVerifier, VerifierConfig,
};

use crate::app::errors;

/// Upper bound on request bodies buffered for target extraction.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub policy: Arc<dyn PolicyDecisionPoint>,
}

impl AuthState {
    /// HS256 verification with the portal's role rules.
    pub fn hs256(secret: impl AsRef<[u8]>, config: VerifierConfig) -> Self {
        Self {
            verifier: Arc::new(Hs256TokenVerifier::with_config(secret, config)),
            policy: Arc::new(RoleRulePolicy::portal_defaults()),
        }
    }

    pub fn guard(&self, route: ProtectedRoute) -> RouteGuard {
        RouteGuard {
            auth: self.clone(),
            route: Arc::new(route),
        }
    }
}

/// Middleware state for one protected route.
#[derive(Clone)]
pub struct RouteGuard {
    auth: AuthState,
    route: Arc<ProtectedRoute>,
}

pub async fn authorize(
    State(guard): State<RouteGuard>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
    req: Request,
    next: Next,
) -> Response {
    let route = &guard.route;
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let identity = match guard.auth.verifier.verify(header) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(action = route.action(), resource = route.resource(), error = %err, "rejected credential");
            return errors::not_authorized(StatusCode::UNAUTHORIZED);
        }
    };

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return errors::json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };
    // Unparseable bodies give extractors nothing to read; handlers report the JSON error.
    let json: Option<Value> = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };
    let path = path.map(|Path(p)| p).unwrap_or_default();

    let context = match route.build_context(identity, &RequestView::new(&path, &query, json.as_ref())) {
        Ok(context) => context,
        Err(err) => {
            tracing::debug!(action = route.action(), resource = route.resource(), error = %err, "bad request target");
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid request target");
        }
    };

    if let Decision::Deny { reason } = guard.auth.policy.decide(&context).await {
        tracing::info!(
            subject = %context.identity().subject(),
            action = context.action(),
            resource = context.resource(),
            reason = %reason,
            "access denied"
        );
        return errors::not_authorized(StatusCode::FORBIDDEN);
    }

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert::<AuthorizationContext>(context);
    next.run(req).await
}
