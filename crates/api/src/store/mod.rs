//! Patient → provider selections.
//!
//! A patient has at most one selected provider. Changing it is delete-then-insert,
//! matching how the selection is replaced from the UI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use careportal_core::SubjectId;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryProviderStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresProviderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("provider store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSelection {
    pub patient_id: SubjectId,
    pub provider_id: SubjectId,
    pub selected_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProviderSelectionStore: Send + Sync {
    async fn get(&self, patient: &SubjectId) -> Result<Option<ProviderSelection>, StoreError>;

    /// Returns whether a selection existed.
    async fn delete(&self, patient: &SubjectId) -> Result<bool, StoreError>;

    async fn insert(&self, selection: ProviderSelection) -> Result<(), StoreError>;
}
