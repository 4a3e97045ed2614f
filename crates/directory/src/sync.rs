//! Role synchronization: move a user's directory memberships to a desired set.
//!
//! ## Ordering
//!
//! Every removal is applied before any addition, so no intermediate state
//! grants more than either the old or the new set.
//!
//! ## Failure semantics
//!
//! Each removal/addition is an independent remote call. If one fails after
//! others succeeded, the directory is left in an intermediate state and the
//! error says exactly what was applied and what failed
//! ([`SyncError::PartialApplication`]). Nothing is rolled back and nothing is
//! retried; callers should re-read memberships to learn the actual state.
//!
//! No locking is done: two concurrent synchronizations of the same user may
//! interleave and leave a result matching neither request.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use careportal_core::{Role, RoleSet, SubjectId};

use crate::directory::{DirectoryError, IdentityDirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Remove,
    Add,
}

/// One membership change (one remote call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOperation {
    pub kind: OperationKind,
    pub role: Role,
}

impl core::fmt::Display for RoleOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            OperationKind::Remove => write!(f, "remove '{}'", self.role),
            OperationKind::Add => write!(f, "add '{}'", self.role),
        }
    }
}

/// Minimal membership diff between two role sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePlan {
    pub to_remove: RoleSet,
    pub to_add: RoleSet,
}

impl RolePlan {
    pub fn between(current: &RoleSet, desired: &RoleSet) -> Self {
        Self {
            to_remove: current.difference(desired),
            to_add: desired.difference(current),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Operations in application order: all removals, then all additions.
    pub fn operations(&self) -> Vec<RoleOperation> {
        let removals = self.to_remove.iter().map(|role| RoleOperation {
            kind: OperationKind::Remove,
            role: role.clone(),
        });
        let additions = self.to_add.iter().map(|role| RoleOperation {
            kind: OperationKind::Add,
            role: role.clone(),
        });
        removals.chain(additions).collect()
    }
}

/// The remote step a synchronization was on when the directory failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum SyncStep {
    ListGroups,
    ReadMemberships,
    Apply(RoleOperation),
}

impl core::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SyncStep::ListGroups => f.write_str("list groups"),
            SyncStep::ReadMemberships => f.write_str("read memberships"),
            SyncStep::Apply(op) => core::fmt::Display::fmt(op, f),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Desired roles not defined in the pool. Nothing was mutated.
    #[error("unknown role(s): {}", .0.iter().map(Role::as_str).collect::<Vec<_>>().join(", "))]
    UnknownRole(Vec<Role>),

    /// Target user does not exist. Nothing was mutated.
    #[error("user not found: {0}")]
    UserNotFound(SubjectId),

    /// The directory failed before any membership change was applied.
    #[error("directory unavailable during {step}: {source}")]
    DirectoryUnavailable {
        step: SyncStep,
        #[source]
        source: DirectoryError,
    },

    /// Some membership changes were applied before one failed.
    #[error("roles partially applied ({} succeeded); {failed} failed: {source}", .applied.len())]
    PartialApplication {
        applied: Vec<RoleOperation>,
        failed: RoleOperation,
        #[source]
        source: DirectoryError,
    },
}

/// Applies [`RolePlan`]s against an [`IdentityDirectory`].
pub struct RoleSynchronizer<D: ?Sized = dyn IdentityDirectory> {
    directory: Arc<D>,
}

impl<D: ?Sized> Clone for RoleSynchronizer<D> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
        }
    }
}

impl<D> RoleSynchronizer<D>
where
    D: IdentityDirectory + ?Sized,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Recognized role names (the pool's groups).
    pub async fn recognized_roles(&self) -> Result<RoleSet, SyncError> {
        let groups = self
            .directory
            .list_groups()
            .await
            .map_err(|source| SyncError::DirectoryUnavailable {
                step: SyncStep::ListGroups,
                source,
            })?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }

    /// Make `target`'s memberships equal `desired`; returns the now-current set.
    pub async fn synchronize(&self, target: &SubjectId, desired: &RoleSet) -> Result<RoleSet, SyncError> {
        let recognized = self.recognized_roles().await?;
        let unknown = desired.difference(&recognized);
        if !unknown.is_empty() {
            tracing::info!(subject = %target, unknown = ?unknown.names(), "rejecting unrecognized roles");
            return Err(SyncError::UnknownRole(unknown.into_iter().collect()));
        }

        let current = self
            .directory
            .list_groups_for_user(target)
            .await
            .map_err(|source| match source {
                DirectoryError::UserNotFound(user) => SyncError::UserNotFound(user),
                source => SyncError::DirectoryUnavailable {
                    step: SyncStep::ReadMemberships,
                    source,
                },
            })?;

        let plan = RolePlan::between(&current, desired);
        if plan.is_noop() {
            tracing::debug!(subject = %target, "roles already in desired state");
            return Ok(current);
        }

        tracing::info!(
            subject = %target,
            remove = ?plan.to_remove.names(),
            add = ?plan.to_add.names(),
            "synchronizing roles"
        );

        let mut applied: Vec<RoleOperation> = Vec::new();
        for op in plan.operations() {
            let result = match op.kind {
                OperationKind::Remove => self.directory.remove_user_from_group(target, &op.role).await,
                OperationKind::Add => self.directory.add_user_to_group(target, &op.role).await,
            };

            if let Err(source) = result {
                if applied.is_empty() {
                    tracing::warn!(subject = %target, failed = %op, error = %source, "role synchronization failed");
                    return Err(SyncError::DirectoryUnavailable {
                        step: SyncStep::Apply(op),
                        source,
                    });
                }
                tracing::warn!(
                    subject = %target,
                    applied = applied.len(),
                    failed = %op,
                    error = %source,
                    "roles partially applied"
                );
                return Err(SyncError::PartialApplication {
                    applied,
                    failed: op,
                    source,
                });
            }
            applied.push(op);
        }

        Ok(desired.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryUser;
    use crate::in_memory::{DirectoryCall, Fault, InMemoryDirectory};
    use proptest::prelude::*;

    const ROLES: [&str; 4] = ["Administrator", "Healthcare-Provider", "Patient", "Auditor"];

    fn sid(s: &str) -> SubjectId {
        SubjectId::parse(s).unwrap()
    }

    fn set(names: &[&'static str]) -> RoleSet {
        names.iter().map(|n| Role::new(*n)).collect()
    }

    fn directory_with(user: &str, groups: &[&'static str]) -> Arc<InMemoryDirectory> {
        let mut dir = InMemoryDirectory::recording();
        for r in ROLES {
            dir = dir.with_group(r, "");
        }
        Arc::new(dir.with_user(DirectoryUser::new(sid(user)), set(groups)))
    }

    #[tokio::test]
    async fn admin_grants_itself_an_extra_role() {
        let dir = directory_with("admin-a", &["Patient"]);
        let sync = RoleSynchronizer::new(dir.clone());

        let now = sync
            .synchronize(&sid("admin-a"), &set(&["Administrator", "Patient"]))
            .await
            .unwrap();

        assert_eq!(now, set(&["Administrator", "Patient"]));
        assert_eq!(dir.memberships(&sid("admin-a")).unwrap(), set(&["Administrator", "Patient"]));
        assert_eq!(dir.mutation_count(), 1);
    }

    #[tokio::test]
    async fn removals_precede_additions() {
        let dir = directory_with("u", &["Patient", "Auditor"]);
        let sync = RoleSynchronizer::new(dir.clone());

        sync.synchronize(&sid("u"), &set(&["Administrator", "Healthcare-Provider"]))
            .await
            .unwrap();

        let mutations: Vec<_> = dir.calls().into_iter().filter(|c| c.is_mutation()).collect();
        assert_eq!(mutations.len(), 4);
        let first_add = mutations
            .iter()
            .position(|c| matches!(c, DirectoryCall::AddUserToGroup(..)))
            .unwrap();
        assert!(mutations[..first_add]
            .iter()
            .all(|c| matches!(c, DirectoryCall::RemoveUserFromGroup(..))));
        assert_eq!(first_add, 2);
    }

    #[tokio::test]
    async fn second_identical_call_mutates_nothing() {
        let dir = directory_with("u", &["Patient"]);
        let sync = RoleSynchronizer::new(dir.clone());
        let desired = set(&["Healthcare-Provider"]);

        sync.synchronize(&sid("u"), &desired).await.unwrap();
        let after_first = dir.mutation_count();
        assert_eq!(dir.memberships(&sid("u")).unwrap(), desired);

        sync.synchronize(&sid("u"), &desired).await.unwrap();
        assert_eq!(dir.mutation_count(), after_first);
    }

    #[tokio::test]
    async fn unknown_role_is_rejected_without_mutation() {
        let dir = directory_with("u", &["Patient"]);
        let sync = RoleSynchronizer::new(dir.clone());

        let err = sync
            .synchronize(&sid("u"), &set(&["Patient", "Superuser"]))
            .await
            .unwrap_err();

        assert_eq!(err, SyncError::UnknownRole(vec![Role::new("Superuser")]));
        assert_eq!(dir.mutation_count(), 0);
        assert_eq!(dir.memberships(&sid("u")).unwrap(), set(&["Patient"]));
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let dir = directory_with("u", &[]);
        let sync = RoleSynchronizer::new(dir);

        assert_eq!(
            sync.synchronize(&sid("ghost"), &set(&["Patient"])).await,
            Err(SyncError::UserNotFound(sid("ghost")))
        );
    }

    #[tokio::test]
    async fn failed_addition_after_removal_leaves_partial_state() {
        let dir = directory_with("u", &["Patient"]);
        dir.inject(Fault::AddToGroup(Role::new("Healthcare-Provider")));
        let sync = RoleSynchronizer::new(dir.clone());

        let err = sync
            .synchronize(&sid("u"), &set(&["Healthcare-Provider"]))
            .await
            .unwrap_err();

        match err {
            SyncError::PartialApplication { applied, failed, .. } => {
                assert_eq!(
                    applied,
                    vec![RoleOperation {
                        kind: OperationKind::Remove,
                        role: Role::new("Patient")
                    }]
                );
                assert_eq!(failed.kind, OperationKind::Add);
                assert_eq!(failed.role, Role::new("Healthcare-Provider"));
            }
            other => panic!("expected partial application, got {other:?}"),
        }

        dir.clear_faults();
        let actual = dir.list_groups_for_user(&sid("u")).await.unwrap();
        assert!(actual.is_empty());
    }

    #[tokio::test]
    async fn first_call_failure_is_unavailable() {
        let dir = directory_with("u", &["Patient"]);
        dir.inject(Fault::RemoveFromGroup(Role::new("Patient")));
        let sync = RoleSynchronizer::new(dir.clone());

        let err = sync.synchronize(&sid("u"), &set(&["Auditor"])).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::DirectoryUnavailable {
                step: SyncStep::Apply(RoleOperation {
                    kind: OperationKind::Remove,
                    ..
                }),
                ..
            }
        ));
        assert_eq!(dir.memberships(&sid("u")).unwrap(), set(&["Patient"]));
    }

    #[tokio::test]
    async fn listing_outage_is_unavailable() {
        let dir = directory_with("u", &["Patient"]);
        dir.inject(Fault::ListGroups);
        let sync = RoleSynchronizer::new(dir.clone());

        assert!(matches!(
            sync.synchronize(&sid("u"), &set(&["Patient"])).await,
            Err(SyncError::DirectoryUnavailable {
                step: SyncStep::ListGroups,
                ..
            })
        ));
        assert_eq!(dir.mutation_count(), 0);
    }

    fn role_subset() -> impl Strategy<Value = RoleSet> {
        prop::collection::btree_set(0..ROLES.len(), 0..=ROLES.len())
            .prop_map(|idx| idx.into_iter().map(|i| Role::new(ROLES[i])).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: after a successful synchronization the directory holds
        /// exactly the desired set, whatever the prior state; a repeat call
        /// performs no mutation.
        #[test]
        fn directory_converges_to_desired(initial in role_subset(), desired in role_subset()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let dir = {
                    let mut d = InMemoryDirectory::recording();
                    for r in ROLES {
                        d = d.with_group(r, "");
                    }
                    Arc::new(d.with_user(DirectoryUser::new(sid("u")), initial.clone()))
                };
                let sync = RoleSynchronizer::new(dir.clone());

                let now = sync.synchronize(&sid("u"), &desired).await.unwrap();
                assert_eq!(&now, &desired);
                assert_eq!(dir.list_groups_for_user(&sid("u")).await.unwrap(), desired.clone());

                let expected = initial.difference(&desired).len() + desired.difference(&initial).len();
                assert_eq!(dir.mutation_count(), expected);

                sync.synchronize(&sid("u"), &desired).await.unwrap();
                assert_eq!(dir.mutation_count(), expected);
            });
        }
    }
}
