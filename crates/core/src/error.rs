//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Keep this focused on deterministic value failures (malformed identifiers).
/// Transport and directory concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. empty subject).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
