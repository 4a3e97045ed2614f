use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::{IntoResponse, Response},
    routing::get,
};

use careportal_auth::{AuthorizationContext, ProtectedRoute, path_subject};
use careportal_core::Role;
use careportal_directory::{UserProfile, search_users};

use crate::app::dto::SearchUsersQuery;
use crate::app::errors;
use crate::app::routes::{guarded, target_subject};
use crate::app::services::AppServices;
use crate::middleware::AuthState;

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route("/", guarded(auth, ProtectedRoute::new("read", "users"), get(search)))
        .route(
            "/:userId",
            guarded(
                auth,
                ProtectedRoute::new("read", "user").target(path_subject("userId", "userId")),
                get(get_user),
            ),
        )
}

/// GET /api/search-users?role=&search=
pub async fn search(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SearchUsersQuery>,
) -> Response {
    let role = query.role.filter(|r| !r.trim().is_empty()).map(Role::from);
    match search_users(services.directory.as_ref(), role.as_ref(), query.search.as_deref()).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// GET /api/search-users/:userId
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<AuthorizationContext>,
) -> Response {
    let user = match target_subject(&context, "userId") {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match services.directory.get_user(&user).await {
        Ok(found) => Json(UserProfile::from(&found)).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}
