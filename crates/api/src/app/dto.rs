//! Request/response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use careportal_directory::Group;

/// `POST /api/user-roles`.
///
/// Fields are optional so that missing ones yield the endpoint's own 400
/// message rather than a generic deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRolesRequest {
    #[serde(alias = "adminSubjectId")]
    pub admin_user_id: Option<String>,
    #[serde(alias = "targetSubjectId")]
    pub target_user_id: Option<String>,
    #[serde(alias = "desiredRoles")]
    pub new_roles: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRolesResponse {
    pub ok: bool,
    pub message: &'static str,
    pub applied_roles: Vec<String>,
    /// The change targeted the caller; their token's role claims are now stale.
    pub session_affected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleCatalogResponse {
    pub ok: bool,
    pub roles: Vec<Group>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRolesResponse {
    pub ok: bool,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchUsersQuery {
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectProviderRequest {
    pub user_id: Option<String>,
    pub provider_id: Option<String>,
}
