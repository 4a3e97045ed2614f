//! Service wiring shared by all handlers.

use std::sync::Arc;

use thiserror::Error;

use careportal_core::{Role, role::well_known};
use careportal_directory::{DirectorySeed, IdentityDirectory, InMemoryDirectory, RoleSynchronizer, SeedError};

use crate::config::ApiConfig;
use crate::store::{InMemoryProviderStore, ProviderSelectionStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("DATABASE_URL is set but the binary was built without the `postgres` feature")]
    PostgresDisabled,
}

pub struct AppServices {
    pub directory: Arc<dyn IdentityDirectory>,
    pub roles: RoleSynchronizer,
    pub providers: Arc<dyn ProviderSelectionStore>,
}

impl AppServices {
    pub fn new(directory: Arc<dyn IdentityDirectory>, providers: Arc<dyn ProviderSelectionStore>) -> Self {
        Self {
            roles: RoleSynchronizer::new(directory.clone()),
            directory,
            providers,
        }
    }

    pub async fn from_config(config: &ApiConfig) -> Result<Self, StartupError> {
        let directory: Arc<dyn IdentityDirectory> = match &config.directory_seed {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading directory seed");
                Arc::new(DirectorySeed::load(path)?.into_directory()?)
            }
            None => {
                tracing::warn!("no directory seed configured; starting with an empty user pool");
                Arc::new(default_directory())
            }
        };

        let providers = provider_store(config).await?;
        Ok(Self::new(directory, providers))
    }
}

/// The portal's standard group pool with no users.
pub fn default_directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_group(Role::from(well_known::PATIENT), "Patients")
        .with_group(Role::from(well_known::HEALTHCARE_PROVIDER), "Healthcare providers")
        .with_group(Role::from(well_known::ADMINISTRATOR), "Portal administrators")
}

#[cfg(feature = "postgres")]
async fn provider_store(config: &ApiConfig) -> Result<Arc<dyn ProviderSelectionStore>, StartupError> {
    match &config.database_url {
        Some(url) => {
            let store = crate::store::PostgresProviderStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("provider selections stored in postgres");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryProviderStore::new())),
    }
}

#[cfg(not(feature = "postgres"))]
async fn provider_store(config: &ApiConfig) -> Result<Arc<dyn ProviderSelectionStore>, StartupError> {
    if config.database_url.is_some() {
        return Err(StartupError::PostgresDisabled);
    }
    Ok(Arc::new(InMemoryProviderStore::new()))
}
