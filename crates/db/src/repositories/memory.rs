use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{MetadataRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryMetadataRepository {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

#[async_trait::async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    async fn get(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(conversation_id.to_string(), key.to_string())).cloned())
    }

    async fn put(
        &self,
        conversation_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.insert((conversation_id.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, conversation_id: &str, key: &str) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(conversation_id.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let repo = InMemoryMetadataRepository::default();

        repo.put("conv-1", "pending_message", json!({"subject": "hi"})).await.expect("put");
        assert_eq!(
            repo.get("conv-1", "pending_message").await.expect("get"),
            Some(json!({"subject": "hi"}))
        );

        repo.delete("conv-1", "pending_message").await.expect("delete");
        assert_eq!(repo.get("conv-1", "pending_message").await.expect("get"), None);
    }
}
