//! Role-change notifier (in-process pub/sub).
//!
//! Published when a role change affecting the running session has been
//! confirmed by the server; listeners react (typically by requesting a silent
//! credential refresh).
//!
//! ## Delivery
//!
//! - Synchronous, in registration order, at most once per listener per `notify`.
//! - Each dispatch iterates a snapshot of the listener list, so handlers may
//!   subscribe or unsubscribe (themselves or others) while being invoked.
//!   Listeners added during a dispatch see the next one, not the current one.
//! - A panicking listener is logged and skipped; later listeners still run.
//! - Nothing is persisted or replayed.
//!
//! A notifier is an explicit value: clone it into every component that needs
//! it. Clones share one listener list; separate `new()` calls are independent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;

use careportal_core::SubjectId;

/// Signal name, used in logs.
pub const ROLE_UPDATE_EVENT: &str = "userRolesUpdated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleChangeEvent {
    /// Subject whose roles changed, when known.
    pub subject: Option<SubjectId>,
}

impl RoleChangeEvent {
    pub fn for_subject(subject: SubjectId) -> Self {
        Self {
            subject: Some(subject),
        }
    }

    pub fn anonymous() -> Self {
        Self { subject: None }
    }

    pub fn name(&self) -> &'static str {
        ROLE_UPDATE_EVENT
    }
}

type Listener = Arc<dyn Fn(&RoleChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct RoleChangeNotifier {
    registry: Arc<Registry>,
}

impl RoleChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RoleChangeEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        // If the lock is poisoned we still hand out a subscription; it just
        // won't receive anything.
        if let Ok(mut listeners) = self.registry.listeners.lock() {
            listeners.push((id, Arc::new(handler)));
        }

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn notify(&self, event: RoleChangeEvent) -> DispatchReport {
        let snapshot: Vec<(u64, Listener)> = match self.registry.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return DispatchReport::default(),
        };

        tracing::debug!(
            event = event.name(),
            subject = ?event.subject,
            listeners = snapshot.len(),
            "dispatching role change"
        );

        let mut report = DispatchReport::default();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(event = event.name(), listener = id, "role change listener panicked");
                }
            }
        }
        report
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl core::fmt::Debug for RoleChangeNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Registration handle; unregisters on [`Subscription::unsubscribe`] or drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut listeners) = registry.listeners.lock() {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
