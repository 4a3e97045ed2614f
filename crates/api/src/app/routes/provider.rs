//! Patient → provider selection.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::json;

use careportal_auth::{AuthorizationContext, ProtectedRoute, body_subject, query_subject};
use careportal_core::SubjectId;

use crate::app::dto::SelectProviderRequest;
use crate::app::errors;
use crate::app::routes::{guarded, target_subject};
use crate::app::services::AppServices;
use crate::middleware::AuthState;
use crate::store::ProviderSelection;

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route(
            "/",
            guarded(
                auth,
                ProtectedRoute::new("read", "provider_selection").target(query_subject("user", "userId")),
                get(get_selection),
            ),
        )
        .route(
            "/",
            guarded(
                auth,
                ProtectedRoute::new("update", "provider_selection").target(body_subject("userId")),
                post(select_provider),
            ),
        )
        .route(
            "/",
            guarded(
                auth,
                ProtectedRoute::new("delete", "provider_selection").target(query_subject("user", "userId")),
                delete(clear_selection),
            ),
        )
}

/// GET /api/provider?user=
pub async fn get_selection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
) -> Response {
    let patient = match target_subject(&context, "userId") {
        Ok(patient) => patient,
        Err(resp) => return resp,
    };
    match services.providers.get(&patient).await {
        Ok(selection) => Json(json!({ "ok": true, "selection": selection })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /api/provider
///
/// Replaces any existing selection.
pub async fn select_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
    body: Result<Json<SelectProviderRequest>, JsonRejection>,
) -> Response {
    let patient = match target_subject(&context, "userId") {
        Ok(patient) => patient,
        Err(resp) => return resp,
    };
    let provider = body
        .ok()
        .and_then(|Json(b)| b.provider_id)
        .and_then(|p| SubjectId::parse(p).ok());
    let Some(provider) = provider else {
        return errors::json_error(StatusCode::BAD_REQUEST, "userId and providerId are required");
    };

    if let Err(e) = services.providers.delete(&patient).await {
        return errors::store_error_to_response(e);
    }
    let selection = ProviderSelection {
        patient_id: patient,
        provider_id: provider,
        selected_at: Utc::now(),
    };
    match services.providers.insert(selection.clone()).await {
        Ok(()) => {
            tracing::info!(patient = %selection.patient_id, provider = %selection.provider_id, "provider selected");
            Json(json!({ "ok": true, "selection": selection })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /api/provider?user=
pub async fn clear_selection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
) -> Response {
    let patient = match target_subject(&context, "userId") {
        Ok(patient) => patient,
        Err(resp) => return resp,
    };
    match services.providers.delete(&patient).await {
        Ok(removed) => Json(json!({ "ok": true, "removed": removed })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
