use chrono::Utc;
use sqlx::Row;

use super::{MetadataRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMetadataRepository {
    pool: DbPool,
}

impl SqlMetadataRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MetadataRepository for SqlMetadataRepository {
    async fn get(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query(
            "SELECT value_json
             FROM conversation_metadata
             WHERE conversation_id = ? AND key = ?",
        )
        .bind(conversation_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let raw: String = row.get("value_json");
            serde_json::from_str(&raw).map_err(|err| RepositoryError::Decode(err.to_string()))
        })
        .transpose()
    }

    async fn put(
        &self,
        conversation_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let value_json =
            serde_json::to_string(&value).map_err(|err| RepositoryError::Decode(err.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_metadata (conversation_id, key, value_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(conversation_id, key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
        )
        .bind(conversation_id)
        .bind(key)
        .bind(value_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, conversation_id: &str, key: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM conversation_metadata WHERE conversation_id = ? AND key = ?",
        )
        .bind(conversation_id)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
