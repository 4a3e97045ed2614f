//! Postgres-backed provider selections.
//!
//! Table layout (created by [`PostgresProviderStore::migrate`]):
//!
//! ```sql
//! provider_selection(patient_id TEXT PRIMARY KEY, provider_id TEXT NOT NULL, selected_at TIMESTAMPTZ NOT NULL)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use careportal_core::SubjectId;

use super::{ProviderSelection, ProviderSelectionStore, StoreError};

pub struct PostgresProviderStore {
    pool: PgPool,
}

impl PostgresProviderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(unavailable)?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS provider_selection (
                patient_id TEXT PRIMARY KEY,
                provider_id TEXT NOT NULL,
                selected_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "provider store query failed");
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl ProviderSelectionStore for PostgresProviderStore {
    async fn get(&self, patient: &SubjectId) -> Result<Option<ProviderSelection>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT patient_id, provider_id, selected_at
            FROM provider_selection
            WHERE patient_id = $1
            "#,
        )
        .bind(patient.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let provider: String = row.try_get("provider_id").map_err(unavailable)?;
        let selected_at: DateTime<Utc> = row.try_get("selected_at").map_err(unavailable)?;
        let provider_id = SubjectId::parse(provider)
            .map_err(|e| StoreError::Unavailable(format!("corrupt provider_id: {e}")))?;

        Ok(Some(ProviderSelection {
            patient_id: patient.clone(),
            provider_id,
            selected_at,
        }))
    }

    async fn delete(&self, patient: &SubjectId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM provider_selection WHERE patient_id = $1")
            .bind(patient.as_str())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, selection: ProviderSelection) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO provider_selection (patient_id, provider_id, selected_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(selection.patient_id.as_str())
        .bind(selection.provider_id.as_str())
        .bind(selection.selected_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}
