//! Role editing from the admin UI.

use std::sync::Arc;

use careportal_core::{RoleSet, SubjectId};
use careportal_events::{RoleChangeEvent, RoleChangeNotifier};

use crate::http::{ClientError, PortalClient, RoleChangeRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChangeOutcome {
    pub message: String,
    pub applied_roles: RoleSet,
    /// The change targeted the signed-in user and a role-change signal was sent.
    pub session_refresh_requested: bool,
}

/// Submits role changes on behalf of the signed-in administrator.
pub struct RoleEditor {
    client: Arc<PortalClient>,
    notifier: RoleChangeNotifier,
    session_subject: SubjectId,
}

impl RoleEditor {
    pub fn new(client: Arc<PortalClient>, notifier: RoleChangeNotifier, session_subject: SubjectId) -> Self {
        Self {
            client,
            notifier,
            session_subject,
        }
    }

    /// Replace `target`'s roles with `desired`.
    ///
    /// The role-change signal is published only after the server confirmed
    /// success, and only when `target` is the signed-in user. Failures publish
    /// nothing.
    pub async fn apply(&self, target: &SubjectId, desired: &RoleSet) -> Result<RoleChangeOutcome, ClientError> {
        if desired.is_empty() {
            return Err(ClientError::Validation("select at least one role".into()));
        }

        let response = self
            .client
            .change_roles(&RoleChangeRequest {
                admin_user_id: &self.session_subject,
                target_user_id: target,
                new_roles: desired,
            })
            .await?;

        let own_session = target == &self.session_subject;
        if own_session {
            let report = self.notifier.notify(RoleChangeEvent::for_subject(target.clone()));
            tracing::info!(
                subject = %target,
                delivered = report.delivered,
                failed = report.failed,
                "own roles changed; signalled session refresh"
            );
        } else {
            tracing::debug!(subject = %target, "roles changed for another user");
        }

        Ok(RoleChangeOutcome {
            message: response.message,
            applied_roles: response.applied_roles,
            session_refresh_requested: own_session,
        })
    }
}
