use chrono::Utc;
use sqlx::Row;

use maitred_core::autonomy::AutonomySettings;

use super::{RepositoryError, SettingsRepository};
use crate::DbPool;

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn load(&self) -> Result<Option<AutonomySettings>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM autonomy_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: String =
            row.try_get("document").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let settings = serde_json::from_str(&document)
            .map_err(|e| RepositoryError::Decode(format!("bad settings document: {e}")))?;
        Ok(Some(settings))
    }

    async fn save(&self, settings: &AutonomySettings) -> Result<(), RepositoryError> {
        settings.validate().map_err(RepositoryError::Domain)?;

        let document = serde_json::to_string(settings)
            .map_err(|e| RepositoryError::Decode(format!("encode settings document: {e}")))?;

        sqlx::query(
            "INSERT INTO autonomy_settings (id, document, updated_at)
             VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 document = excluded.document,
                 updated_at = excluded.updated_at",
        )
        .bind(&document)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
