//! Reacting to role-change signals with a silent credential refresh.

use std::sync::Arc;

use tokio::runtime::Handle;

use careportal_core::SubjectId;
use careportal_events::{RoleChangeEvent, RoleChangeNotifier, Subscription};

use crate::session::CredentialProvider;

/// Listener that renews the session's credential after its roles changed, so
/// the next request carries the new role claims.
///
/// Failures are logged and not retried; the session keeps its old token until
/// the next natural refresh.
#[derive(Clone)]
pub struct RefreshCoordinator {
    session_subject: SubjectId,
    credentials: Arc<dyn CredentialProvider>,
    runtime: Handle,
}

impl RefreshCoordinator {
    pub fn new(session_subject: SubjectId, credentials: Arc<dyn CredentialProvider>, runtime: Handle) -> Self {
        Self {
            session_subject,
            credentials,
            runtime,
        }
    }

    /// Listen on `notifier` until the returned subscription is dropped.
    #[must_use = "dropping the subscription stops refreshes"]
    pub fn attach(&self, notifier: &RoleChangeNotifier) -> Subscription {
        let this = self.clone();
        notifier.subscribe(move |event| this.on_role_change(event))
    }

    fn on_role_change(&self, event: &RoleChangeEvent) {
        if let Some(subject) = &event.subject {
            if subject != &self.session_subject {
                tracing::debug!(event = event.name(), %subject, "role change for another subject; ignoring");
                return;
            }
        }

        let credentials = self.credentials.clone();
        let subject = self.session_subject.clone();
        self.runtime.spawn(async move {
            match credentials.refresh_silently().await {
                Ok(_) => tracing::info!(%subject, "session credential refreshed after role change"),
                Err(err) => {
                    tracing::error!(%subject, error = %err, "silent refresh after role change failed")
                }
            }
        });
    }
}
