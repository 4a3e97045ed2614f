//! JSON seed for the in-memory directory (local runs and demos).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use careportal_core::{DomainError, Role, SubjectId};

use crate::directory::{DirectoryUser, UserAttributes, UserStatus};
use crate::in_memory::InMemoryDirectory;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read directory seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse directory seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid directory seed: {0}")]
    Invalid(#[from] DomainError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub sub: String,
    #[serde(default)]
    pub attributes: UserAttributes,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub status: UserStatus,
}

/// ```json
/// {
///   "groups": [{ "name": "Patient", "description": "..." }],
///   "users": [{ "sub": "...", "attributes": { "email": "..." }, "groups": ["Patient"] }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub groups: Vec<SeedGroup>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

impl DirectorySeed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build a directory; groups referenced by users but not declared are
    /// created with an empty description.
    pub fn into_directory(self) -> Result<InMemoryDirectory, SeedError> {
        let directory = InMemoryDirectory::new();
        for group in self.groups {
            directory.define_group(Role::new(group.name), group.description);
        }
        for user in self.users {
            let subject = SubjectId::parse(user.sub)?;
            let groups: Vec<Role> = user.groups.into_iter().map(Role::new).collect();
            for g in &groups {
                directory.define_group(g.clone(), "");
            }
            let mut record = DirectoryUser::new(subject);
            record.attributes = user.attributes;
            record.status = user.status;
            directory.put_user(record, groups);
        }
        Ok(directory)
    }
}
