use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use careportal_auth::AuthorizationContext;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

pub async fn whoami(Extension(context): Extension<AuthorizationContext>) -> impl IntoResponse {
    let identity = context.identity();
    Json(json!({
        "sub": identity.subject(),
        "roles": identity.roles(),
        "context": context,
    }))
}
