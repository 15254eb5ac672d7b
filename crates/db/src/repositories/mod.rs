use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod metadata;

pub use memory::InMemoryMetadataRepository;
pub use metadata::SqlMetadataRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Key/value metadata scoped to one conversation. Values are opaque JSON
/// here; the typed view lives in `store`.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn get(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError>;

    async fn put(
        &self,
        conversation_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, conversation_id: &str, key: &str) -> Result<(), RepositoryError>;
}
