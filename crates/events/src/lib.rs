//! In-process signals shared between client components.

pub mod notifier;

pub use notifier::{DispatchReport, ROLE_UPDATE_EVENT, RoleChangeEvent, RoleChangeNotifier, Subscription};
