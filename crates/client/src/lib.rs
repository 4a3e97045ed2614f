//! `careportal-client` — client-resident session handling.
//!
//! - [`PortalClient`]: authenticated HTTP calls with one forced refresh on `401`
//! - [`RoleEditor`]: role changes that signal the session when it changed itself
//! - [`RefreshCoordinator`]: turns role-change signals into silent credential refreshes
//! - [`DebouncedLookup`]: debounced, abort-on-supersede lookups for search boxes

pub mod config;
pub mod http;
pub mod lookup;
pub mod refresh;
pub mod roles;
pub mod session;

pub use config::ClientConfig;
pub use http::{ClientError, PortalClient, ProviderSelection, RoleCatalogEntry, RoleChangeRequest, RoleChangeResponse, UserSummary};
pub use lookup::{DebouncedLookup, LookupOutcome};
pub use refresh::RefreshCoordinator;
pub use roles::{RoleChangeOutcome, RoleEditor};
pub use session::{CredentialProvider, SessionError};
