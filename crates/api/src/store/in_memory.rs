use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use careportal_core::SubjectId;

use super::{ProviderSelection, ProviderSelectionStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryProviderStore {
    selections: RwLock<HashMap<SubjectId, ProviderSelection>>,
}

impl InMemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".into())
}

#[async_trait]
impl ProviderSelectionStore for InMemoryProviderStore {
    async fn get(&self, patient: &SubjectId) -> Result<Option<ProviderSelection>, StoreError> {
        Ok(self.selections.read().map_err(poisoned)?.get(patient).cloned())
    }

    async fn delete(&self, patient: &SubjectId) -> Result<bool, StoreError> {
        Ok(self.selections.write().map_err(poisoned)?.remove(patient).is_some())
    }

    async fn insert(&self, selection: ProviderSelection) -> Result<(), StoreError> {
        self.selections
            .write()
            .map_err(poisoned)?
            .insert(selection.patient_id.clone(), selection);
        Ok(())
    }
}
