use serde::Serialize;

use careportal_core::{RoleSet, SubjectId};

/// A verified subject and the roles its credential declares.
///
/// Only token verifiers in this crate can produce one, so holding an
/// `Identity` means a credential was checked. Roles may be stale relative
/// to the directory until the session refreshes its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    #[serde(rename = "sub")]
    subject: SubjectId,
    roles: RoleSet,
}

impl Identity {
    pub(crate) fn new(subject: SubjectId, roles: RoleSet) -> Self {
        Self { subject, roles }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn has_any_role(&self, roles: &RoleSet) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }
}
