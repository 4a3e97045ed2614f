//! Identity directory contract (mechanics only).
//!
//! The directory is the source of truth for users and their group (role)
//! memberships. Implementations talk to a managed user pool; each method is
//! one independent remote call with no multi-call transaction available.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use careportal_core::{Role, RoleSet, SubjectId};

/// Page size used for listing calls.
pub const PAGE_LIMIT: usize = 60;

pub const ATTR_GIVEN_NAME: &str = "given_name";
pub const ATTR_FAMILY_NAME: &str = "family_name";
pub const ATTR_EMAIL: &str = "email";
pub const ATTR_PHONE: &str = "phone_number";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user not found: {0}")]
    UserNotFound(SubjectId),

    #[error("group not found: {0}")]
    GroupNotFound(Role),

    /// Transport or service failure.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// A group defined in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: Role,
    #[serde(default)]
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub last_modified_date: DateTime<Utc>,
}

impl Group {
    pub fn new(name: Role, description: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name,
            description: description.into(),
            creation_date: at,
            last_modified_date: at,
        }
    }
}

pub type UserAttributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Confirmed,
    Unconfirmed,
    ForceChangePassword,
    ResetRequired,
}

/// A user record as the directory reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub subject: SubjectId,
    #[serde(default)]
    pub attributes: UserAttributes,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub status: UserStatus,
}

fn default_enabled() -> bool {
    true
}

impl DirectoryUser {
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            attributes: UserAttributes::new(),
            enabled: true,
            status: UserStatus::Confirmed,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Operations consumed from the identity directory.
///
/// ## Thread Safety
///
/// Implementations are shared across request handlers (`Send + Sync`).
/// Nothing here serializes concurrent mutations of the same user.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Every group defined in the pool (the recognized role names).
    async fn list_groups(&self) -> Result<Vec<Group>, DirectoryError>;

    /// Current group memberships of one user.
    async fn list_groups_for_user(&self, user: &SubjectId) -> Result<RoleSet, DirectoryError>;

    async fn add_user_to_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError>;

    async fn remove_user_from_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError>;

    /// Users in the pool, up to `limit`.
    async fn list_users(&self, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError>;

    async fn list_users_in_group(&self, group: &Role, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError>;

    async fn get_user(&self, user: &SubjectId) -> Result<DirectoryUser, DirectoryError>;
}

#[async_trait]
impl<D> IdentityDirectory for std::sync::Arc<D>
where
    D: IdentityDirectory + ?Sized,
{
    async fn list_groups(&self) -> Result<Vec<Group>, DirectoryError> {
        (**self).list_groups().await
    }

    async fn list_groups_for_user(&self, user: &SubjectId) -> Result<RoleSet, DirectoryError> {
        (**self).list_groups_for_user(user).await
    }

    async fn add_user_to_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError> {
        (**self).add_user_to_group(user, group).await
    }

    async fn remove_user_from_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError> {
        (**self).remove_user_from_group(user, group).await
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError> {
        (**self).list_users(limit).await
    }

    async fn list_users_in_group(&self, group: &Role, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError> {
        (**self).list_users_in_group(group, limit).await
    }

    async fn get_user(&self, user: &SubjectId) -> Result<DirectoryUser, DirectoryError> {
        (**self).get_user(user).await
    }
}
