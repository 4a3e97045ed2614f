//! Role catalog, per-user roles, and role changes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;

use careportal_auth::{AuthorizationContext, BadTarget, ProtectedRoute, RequestView, TargetRef, path_subject};
use careportal_core::{Role, RoleSet, SubjectId};
use careportal_directory::PAGE_LIMIT;

use crate::app::dto::{ChangeRolesRequest, ChangeRolesResponse, RoleCatalogResponse, UserRolesResponse};
use crate::app::errors;
use crate::app::routes::{guarded, target_subject};
use crate::app::services::AppServices;
use crate::middleware::AuthState;

const REQUIRED_FIELDS: &str = "adminUserId, targetUserId, and newRoles (array) are required";

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route("/", guarded(auth, ProtectedRoute::new("read", "roles"), get(list_roles)))
        .route(
            "/",
            guarded(
                auth,
                ProtectedRoute::new("update", "user_roles").target(change_target),
                post(change_roles),
            ),
        )
        .route(
            "/:userId",
            guarded(
                auth,
                ProtectedRoute::new("read", "user_roles").target(path_subject("userId", "userId")),
                get(user_roles),
            ),
        )
}

/// The target user, when the body names one. Absence is reported by the
/// handler, which owns the endpoint's validation message.
fn change_target(req: &RequestView<'_>) -> Result<TargetRef, BadTarget> {
    Ok(req
        .body()
        .and_then(|b| b.get("targetUserId").or_else(|| b.get("targetSubjectId")))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(|s| TargetRef::object("userId", s))
        .unwrap_or(TargetRef::None))
}

/// GET /api/user-roles
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.directory.list_groups().await {
        Ok(groups) => Json(RoleCatalogResponse {
            ok: true,
            roles: groups.into_iter().take(PAGE_LIMIT).collect(),
        })
        .into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// GET /api/user-roles/:userId
pub async fn user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
) -> Response {
    let user = match target_subject(&context, "userId") {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match services.directory.list_groups_for_user(&user).await {
        Ok(roles) => Json(UserRolesResponse {
            ok: true,
            roles: roles.names(),
        })
        .into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// POST /api/user-roles
///
/// Replaces the target's roles with exactly `newRoles`. The caller must name
/// themselves as `adminUserId`.
pub async fn change_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
    body: Result<Json<ChangeRolesRequest>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable role change body");
            ChangeRolesRequest::default()
        }
    };

    let (Some(admin), Some(target), Some(Value::Array(new_roles))) =
        (body.admin_user_id, body.target_user_id, body.new_roles)
    else {
        return errors::json_error(StatusCode::BAD_REQUEST, REQUIRED_FIELDS);
    };
    let (Ok(admin), Ok(target)) = (SubjectId::parse(admin), SubjectId::parse(target)) else {
        return errors::json_error(StatusCode::BAD_REQUEST, REQUIRED_FIELDS);
    };

    let caller = context.identity().subject();
    if &admin != caller {
        tracing::info!(%caller, claimed = %admin, "adminUserId does not match the authenticated subject");
        return errors::not_authorized(StatusCode::FORBIDDEN);
    }

    let mut desired = RoleSet::new();
    for item in new_roles {
        match item {
            Value::String(name) if !name.trim().is_empty() => {
                desired.insert(Role::from(name.trim().to_string()));
            }
            _ => return errors::json_error(StatusCode::BAD_REQUEST, "newRoles must contain role names"),
        }
    }

    match services.roles.synchronize(&target, &desired).await {
        Ok(applied) => {
            let session_affected = &target == caller;
            tracing::info!(%caller, subject = %target, roles = ?applied.names(), session_affected, "roles changed");
            Json(ChangeRolesResponse {
                ok: true,
                message: "Roles changed successfully",
                applied_roles: applied.names(),
                session_affected,
            })
            .into_response()
        }
        Err(e) => errors::sync_error_to_response(e),
    }
}
