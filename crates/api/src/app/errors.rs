use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use careportal_directory::{DirectoryError, SyncError};

use crate::store::StoreError;

/// Same body for every credential or policy failure; which check failed is
/// only logged.
pub const NOT_AUTHORIZED: &str = "not authorized";
pub const USER_NOT_FOUND: &str = "User not found";

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

pub fn not_authorized(status: StatusCode) -> Response {
    json_error(status, NOT_AUTHORIZED)
}

pub fn directory_error_to_response(err: DirectoryError) -> Response {
    match err {
        DirectoryError::UserNotFound(_) => json_error(StatusCode::NOT_FOUND, USER_NOT_FOUND),
        DirectoryError::GroupNotFound(role) => json_error(StatusCode::BAD_REQUEST, format!("unknown role: {role}")),
        DirectoryError::Unavailable(msg) => {
            tracing::error!(error = %msg, "identity directory unavailable");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "identity directory unavailable")
        }
    }
}

pub fn sync_error_to_response(err: SyncError) -> Response {
    let message = err.to_string();
    match err {
        SyncError::UnknownRole(_) => json_error(StatusCode::BAD_REQUEST, message),
        SyncError::UserNotFound(_) => json_error(StatusCode::NOT_FOUND, USER_NOT_FOUND),
        SyncError::DirectoryUnavailable { step, .. } => {
            tracing::error!(error = %message, "role synchronization failed before any change");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({
                    "error": message,
                    "partial": false,
                    "failedOperation": step,
                    "appliedOperations": [],
                })),
            )
                .into_response()
        }
        SyncError::PartialApplication { applied, failed, .. } => {
            tracing::error!(error = %message, applied = applied.len(), "role synchronization partially applied");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({
                    "error": message,
                    "partial": true,
                    "failedOperation": failed,
                    "appliedOperations": applied,
                })),
            )
                .into_response()
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    tracing::error!(error = %err, "provider store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to access provider selection")
}
