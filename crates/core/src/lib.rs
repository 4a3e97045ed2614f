//! `careportal-core` — vocabulary shared by the server and client crates.
//!
//! This crate contains **pure** value types (no IO, no async).

pub mod error;
pub mod id;
pub mod role;

pub use error::DomainError;
pub use id::SubjectId;
pub use role::{Role, RoleSet};
