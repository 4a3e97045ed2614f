//! `careportal-directory` — the identity directory boundary and the role
//! synchronization algorithm that runs against it.

pub mod directory;
pub mod in_memory;
pub mod search;
pub mod seed;
pub mod sync;

pub use directory::{
    DirectoryError, DirectoryUser, Group, IdentityDirectory, PAGE_LIMIT, UserAttributes, UserStatus,
};
pub use in_memory::{DirectoryCall, Fault, InMemoryDirectory};
pub use search::{UserProfile, UserSummary, search_users};
pub use seed::{DirectorySeed, SeedError};
pub use sync::{OperationKind, RoleOperation, RolePlan, RoleSynchronizer, SyncError, SyncStep};
