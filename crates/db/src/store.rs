//! Typed view over conversation metadata, plus per-conversation locks.
//!
//! One pending action per category per conversation: the scheduling slot
//! lives under `pending_event`, the message slot under `pending_message`.
//! Corrupt stored JSON is surfaced as an error, never silently replaced.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use staffer_core::{PendingEvent, PendingMessage};

use crate::repositories::{MetadataRepository, RepositoryError};

pub const PENDING_EVENT_KEY: &str = "pending_event";
pub const PENDING_MESSAGE_KEY: &str = "pending_message";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("corrupt stored value under `{key}`: {source}")]
    Corrupt { key: &'static str, source: serde_json::Error },
}

#[derive(Clone)]
pub struct PendingStore {
    repository: Arc<dyn MetadataRepository>,
}

impl PendingStore {
    pub fn new(repository: Arc<dyn MetadataRepository>) -> Self {
        Self { repository }
    }

    pub async fn load_event(
        &self,
        conversation_id: &str,
    ) -> Result<Option<PendingEvent>, StoreError> {
        self.load(conversation_id, PENDING_EVENT_KEY).await
    }

    pub async fn save_event(
        &self,
        conversation_id: &str,
        event: &PendingEvent,
    ) -> Result<(), StoreError> {
        self.save(conversation_id, PENDING_EVENT_KEY, event).await
    }

    pub async fn clear_event(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.repository.delete(conversation_id, PENDING_EVENT_KEY).await?;
        Ok(())
    }

    pub async fn load_message(
        &self,
        conversation_id: &str,
    ) -> Result<Option<PendingMessage>, StoreError> {
        self.load(conversation_id, PENDING_MESSAGE_KEY).await
    }

    pub async fn save_message(
        &self,
        conversation_id: &str,
        message: &PendingMessage,
    ) -> Result<(), StoreError> {
        self.save(conversation_id, PENDING_MESSAGE_KEY, message).await
    }

    pub async fn clear_message(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.repository.delete(conversation_id, PENDING_MESSAGE_KEY).await?;
        Ok(())
    }

    async fn load<T: serde::de::DeserializeOwned>(
        &self,
        conversation_id: &str,
        key: &'static str,
    ) -> Result<Option<T>, StoreError> {
        let value = self.repository.get(conversation_id, key).await?;
        value
            .map(|v| serde_json::from_value(v).map_err(|source| StoreError::Corrupt { key, source }))
            .transpose()
    }

    async fn save<T: serde::Serialize>(
        &self,
        conversation_id: &str,
        key: &'static str,
        value: &T,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(value).map_err(|source| StoreError::Corrupt { key, source })?;
        self.repository.put(conversation_id, key, value).await?;
        Ok(())
    }
}

/// Serializes pending-action read-modify-write cycles per conversation.
/// Distinct conversations never contend.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(conversation_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
