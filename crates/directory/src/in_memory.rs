//! In-memory identity directory for tests/dev.
//!
//! Can be told to fail specific calls, which is how partial-application
//! behavior is exercised. A directory built with
//! [`InMemoryDirectory::recording`] also keeps a log of every call it
//! receives; the default one keeps nothing, since the dev server runs on it.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use careportal_core::{Role, RoleSet, SubjectId};

use crate::directory::{DirectoryError, DirectoryUser, Group, IdentityDirectory};

/// A call received by the in-memory directory, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    ListGroups,
    ListGroupsForUser(SubjectId),
    AddUserToGroup(SubjectId, Role),
    RemoveUserFromGroup(SubjectId, Role),
    ListUsers,
    ListUsersInGroup(Role),
    GetUser(SubjectId),
}

impl DirectoryCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DirectoryCall::AddUserToGroup(..) | DirectoryCall::RemoveUserFromGroup(..)
        )
    }
}

/// Simulated outage. Faults stay armed until [`InMemoryDirectory::clear_faults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    ListGroups,
    ListGroupsForUser,
    AddToGroup(Role),
    RemoveFromGroup(Role),
}

impl Fault {
    fn matches(&self, call: &DirectoryCall) -> bool {
        match (self, call) {
            (Fault::ListGroups, DirectoryCall::ListGroups) => true,
            (Fault::ListGroupsForUser, DirectoryCall::ListGroupsForUser(_)) => true,
            (Fault::AddToGroup(r), DirectoryCall::AddUserToGroup(_, g)) => r == g,
            (Fault::RemoveFromGroup(r), DirectoryCall::RemoveUserFromGroup(_, g)) => r == g,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct UserEntry {
    user: DirectoryUser,
    groups: RoleSet,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<Role, Group>,
    users: BTreeMap<SubjectId, UserEntry>,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<State>,
    log_calls: bool,
    calls: Mutex<Vec<DirectoryCall>>,
    faults: Mutex<Vec<Fault>>,
}

impl InMemoryDirectory {
    /// A directory that does not log calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory that logs every call for later inspection via [`Self::calls`].
    pub fn recording() -> Self {
        Self::new().with_call_log()
    }

    /// Start logging calls from now on.
    pub fn with_call_log(mut self) -> Self {
        self.log_calls = true;
        self
    }

    /// Define a group (idempotent).
    pub fn with_group(self, name: impl Into<Role>, description: impl Into<String>) -> Self {
        self.define_group(name.into(), description);
        self
    }

    pub fn define_group(&self, name: Role, description: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state
                .groups
                .entry(name.clone())
                .or_insert_with(|| Group::new(name, description, Utc::now()));
        }
    }

    /// Insert (or replace) a user with the given memberships, bypassing the call log.
    pub fn with_user(self, user: DirectoryUser, groups: impl IntoIterator<Item = Role>) -> Self {
        self.put_user(user, groups);
        self
    }

    pub fn put_user(&self, user: DirectoryUser, groups: impl IntoIterator<Item = Role>) {
        if let Ok(mut state) = self.state.write() {
            let groups: RoleSet = groups.into_iter().collect();
            state.users.insert(user.subject.clone(), UserEntry { user, groups });
        }
    }

    pub fn inject(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Logged calls in arrival order. Always empty unless the directory is recording.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    /// Memberships without going through the call log (test inspection).
    pub fn memberships(&self, user: &SubjectId) -> Option<RoleSet> {
        let state = self.state.read().ok()?;
        state.users.get(user).map(|e| e.groups.clone())
    }

    fn record(&self, call: DirectoryCall) -> Result<(), DirectoryError> {
        let faulted = self
            .faults
            .lock()
            .map_err(|_| poisoned())?
            .iter()
            .any(|f| f.matches(&call));

        let outage = faulted.then(|| {
            DirectoryError::Unavailable(format!("simulated outage during {call:?}"))
        });
        if self.log_calls {
            self.calls.lock().map_err(|_| poisoned())?.push(call);
        }

        match outage {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn list_groups(&self) -> Result<Vec<Group>, DirectoryError> {
        self.record(DirectoryCall::ListGroups)?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.groups.values().cloned().collect())
    }

    async fn list_groups_for_user(&self, user: &SubjectId) -> Result<RoleSet, DirectoryError> {
        self.record(DirectoryCall::ListGroupsForUser(user.clone()))?;
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .users
            .get(user)
            .map(|e| e.groups.clone())
            .ok_or_else(|| DirectoryError::UserNotFound(user.clone()))
    }

    async fn add_user_to_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError> {
        self.record(DirectoryCall::AddUserToGroup(user.clone(), group.clone()))?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.groups.contains_key(group) {
            return Err(DirectoryError::GroupNotFound(group.clone()));
        }
        let entry = state
            .users
            .get_mut(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.clone()))?;
        entry.groups.insert(group.clone());
        Ok(())
    }

    async fn remove_user_from_group(&self, user: &SubjectId, group: &Role) -> Result<(), DirectoryError> {
        self.record(DirectoryCall::RemoveUserFromGroup(user.clone(), group.clone()))?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.groups.contains_key(group) {
            return Err(DirectoryError::GroupNotFound(group.clone()));
        }
        let entry = state
            .users
            .get_mut(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.clone()))?;
        entry.groups.remove(group);
        Ok(())
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.record(DirectoryCall::ListUsers)?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.users.values().take(limit).map(|e| e.user.clone()).collect())
    }

    async fn list_users_in_group(&self, group: &Role, limit: usize) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.record(DirectoryCall::ListUsersInGroup(group.clone()))?;
        let state = self.state.read().map_err(|_| poisoned())?;
        if !state.groups.contains_key(group) {
            return Err(DirectoryError::GroupNotFound(group.clone()));
        }
        Ok(state
            .users
            .values()
            .filter(|e| e.groups.contains(group))
            .take(limit)
            .map(|e| e.user.clone())
            .collect())
    }

    async fn get_user(&self, user: &SubjectId) -> Result<DirectoryUser, DirectoryError> {
        self.record(DirectoryCall::GetUser(user.clone()))?;
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .users
            .get(user)
            .map(|e| e.user.clone())
            .ok_or_else(|| DirectoryError::UserNotFound(user.clone()))
    }
}
