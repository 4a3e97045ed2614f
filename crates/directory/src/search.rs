//! User lookup over the directory (search box and profile views).

use serde::Serialize;

use careportal_core::Role;

use crate::directory::{
    ATTR_EMAIL, ATTR_FAMILY_NAME, ATTR_GIVEN_NAME, ATTR_PHONE, DirectoryError, DirectoryUser,
    IdentityDirectory, PAGE_LIMIT, UserStatus,
};

/// Search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub sub: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl From<&DirectoryUser> for UserSummary {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            sub: user.subject.to_string(),
            first_name: user.attribute(ATTR_GIVEN_NAME).map(str::to_string),
            last_name: user.attribute(ATTR_FAMILY_NAME).map(str::to_string),
            email: user.attribute(ATTR_EMAIL).map(str::to_string),
        }
    }
}

/// Single-user view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub sub: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub enabled: bool,
    pub status: UserStatus,
}

impl From<&DirectoryUser> for UserProfile {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            sub: user.subject.to_string(),
            first_name: user.attribute(ATTR_GIVEN_NAME).map(str::to_string),
            last_name: user.attribute(ATTR_FAMILY_NAME).map(str::to_string),
            email: user.attribute(ATTR_EMAIL).map(str::to_string),
            phone: user.attribute(ATTR_PHONE).map(str::to_string),
            enabled: user.enabled,
            status: user.status,
        }
    }
}

/// List users (optionally only members of `role`) whose given name, family
/// name or email contains `query`, case-insensitively.
///
/// The directory only supports prefix filters, so matching is done here over
/// one page of results.
pub async fn search_users<D>(
    directory: &D,
    role: Option<&Role>,
    query: Option<&str>,
) -> Result<Vec<UserSummary>, DirectoryError>
where
    D: IdentityDirectory + ?Sized,
{
    let users = match role {
        Some(role) => directory.list_users_in_group(role, PAGE_LIMIT).await?,
        None => directory.list_users(PAGE_LIMIT).await?,
    };

    let needle = query.filter(|q| !q.is_empty()).map(str::to_lowercase);

    Ok(users
        .iter()
        .filter(|u| match &needle {
            Some(n) => matches(u, n),
            None => true,
        })
        .map(UserSummary::from)
        .collect())
}

fn matches(user: &DirectoryUser, needle: &str) -> bool {
    [ATTR_GIVEN_NAME, ATTR_FAMILY_NAME, ATTR_EMAIL]
        .iter()
        .filter_map(|attr| user.attribute(attr))
        .any(|v| v.to_lowercase().contains(needle))
}
