//! Policy decision seam.
//!
//! The real decision point is an external engine that consumes the
//! [`AuthorizationContext`]; the implementations here are the local stand-ins
//! the server is wired with.

use std::collections::HashMap;

use async_trait::async_trait;

use careportal_core::{Role, RoleSet, role::well_known};

use crate::context::AuthorizationContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Denied; `reason` is for logs only and never leaves the server.
    Deny { reason: String },
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[async_trait]
pub trait PolicyDecisionPoint: Send + Sync {
    async fn decide(&self, context: &AuthorizationContext) -> Decision;
}

/// Allows every verified identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAuthenticated;

#[async_trait]
impl PolicyDecisionPoint for AllowAuthenticated {
    async fn decide(&self, _context: &AuthorizationContext) -> Decision {
        Decision::Allow
    }
}

/// What a rule requires of the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    AnyRole(RoleSet),
    /// The (untrusted) target names the caller, or the caller holds one of `roles`.
    SelfOrAnyRole {
        target_field: &'static str,
        roles: RoleSet,
    },
}

/// Static table of `(action, resource) -> requirement`; unlisted pairs are denied.
#[derive(Debug, Clone, Default)]
pub struct RoleRulePolicy {
    rules: HashMap<(&'static str, &'static str), Requirement>,
}

impl RoleRulePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, action: &'static str, resource: &'static str, requirement: Requirement) -> Self {
        self.rules.insert((action, resource), requirement);
        self
    }

    /// Rules for the portal's own routes.
    pub fn portal_defaults() -> Self {
        let admins = roles(&[well_known::ADMINISTRATOR]);
        let staff = roles(&[well_known::ADMINISTRATOR, well_known::HEALTHCARE_PROVIDER]);

        Self::new()
            .rule("read", "session", Requirement::Authenticated)
            .rule("read", "roles", Requirement::AnyRole(admins.clone()))
            .rule(
                "read",
                "user_roles",
                Requirement::SelfOrAnyRole {
                    target_field: "userId",
                    roles: admins.clone(),
                },
            )
            .rule("update", "user_roles", Requirement::AnyRole(admins.clone()))
            .rule("read", "users", Requirement::Authenticated)
            .rule("read", "user", Requirement::Authenticated)
            .rule(
                "read",
                "provider_selection",
                Requirement::SelfOrAnyRole {
                    target_field: "userId",
                    roles: staff,
                },
            )
            .rule(
                "update",
                "provider_selection",
                Requirement::SelfOrAnyRole {
                    target_field: "userId",
                    roles: admins.clone(),
                },
            )
            .rule(
                "delete",
                "provider_selection",
                Requirement::SelfOrAnyRole {
                    target_field: "userId",
                    roles: admins,
                },
            )
    }

    fn evaluate(&self, context: &AuthorizationContext) -> Decision {
        let identity = context.identity();
        let Some(requirement) = self.rules.get(&(context.action(), context.resource())) else {
            return Decision::deny(format!(
                "no rule for {}:{}",
                context.action(),
                context.resource()
            ));
        };

        match requirement {
            Requirement::Authenticated => Decision::Allow,
            Requirement::AnyRole(roles) => {
                if identity.has_any_role(roles) {
                    Decision::Allow
                } else {
                    Decision::deny(format!("requires one of {:?}", roles.names()))
                }
            }
            Requirement::SelfOrAnyRole { target_field, roles } => {
                if context.target().field(target_field) == Some(identity.subject().as_str())
                    || identity.has_any_role(roles)
                {
                    Decision::Allow
                } else {
                    Decision::deny(format!(
                        "target is not the caller and caller lacks {:?}",
                        roles.names()
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl PolicyDecisionPoint for RoleRulePolicy {
    async fn decide(&self, context: &AuthorizationContext) -> Decision {
        self.evaluate(context)
    }
}

fn roles(names: &[&'static str]) -> RoleSet {
    names.iter().map(|n| Role::new(*n)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::context::RequestView;
    use crate::identity::Identity;
    use crate::route::{ProtectedRoute, query_subject};
    use careportal_core::SubjectId;

    fn identity(sub: &str, role_names: &[&'static str]) -> Identity {
        Identity::new(SubjectId::parse(sub).unwrap(), roles(role_names))
    }

    fn context(identity: Identity, route: ProtectedRoute, user: Option<&str>) -> AuthorizationContext {
        let path = HashMap::new();
        let mut query = HashMap::new();
        if let Some(u) = user {
            query.insert("user".to_string(), u.to_string());
        }
        route
            .build_context(identity, &RequestView::new(&path, &query, None))
            .unwrap()
    }

    #[tokio::test]
    async fn admin_only_rule() {
        let policy = RoleRulePolicy::portal_defaults();
        let route = ProtectedRoute::new("update", "user_roles");

        let admin = context(identity("a", &[well_known::ADMINISTRATOR]), route.clone(), None);
        let patient = context(identity("p", &[well_known::PATIENT]), route, None);

        assert!(policy.decide(&admin).await.is_allowed());
        assert!(!policy.decide(&patient).await.is_allowed());
    }

    #[tokio::test]
    async fn self_or_role_rule_reads_target() {
        let policy = RoleRulePolicy::portal_defaults();
        let route = ProtectedRoute::new("update", "provider_selection")
            .target(query_subject("user", "userId"));

        let own = context(identity("p", &[well_known::PATIENT]), route.clone(), Some("p"));
        let other = context(identity("p", &[well_known::PATIENT]), route.clone(), Some("q"));
        let admin = context(identity("a", &[well_known::ADMINISTRATOR]), route, Some("q"));

        assert!(policy.decide(&own).await.is_allowed());
        assert!(!policy.decide(&other).await.is_allowed());
        assert!(policy.decide(&admin).await.is_allowed());
    }

    #[tokio::test]
    async fn unlisted_pairs_are_denied_and_allow_all_allows() {
        let ctx = context(
            identity("a", &[well_known::ADMINISTRATOR]),
            ProtectedRoute::new("drop", "database"),
            None,
        );

        assert!(!RoleRulePolicy::portal_defaults().decide(&ctx).await.is_allowed());
        assert!(AllowAuthenticated.decide(&ctx).await.is_allowed());
    }
}
