//! Context retrieval boundary.
//!
//! Prompt enrichment only; nothing here decides anything. Workers that
//! consult a retriever must behave identically when it returns nothing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub content: String,
    pub source: Option<String>,
    pub score: f32,
}

#[derive(Clone, Debug, Default)]
pub struct ContextFilters {
    /// Maximum snippets to return; 0 means the retriever's default.
    pub limit: usize,
    pub source: Option<String>,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context retrieval transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("context retrieval returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        filters: &ContextFilters,
    ) -> Result<Vec<ContextSnippet>, ContextError>;
}

/// Default when no memory service is configured.
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _filters: &ContextFilters,
    ) -> Result<Vec<ContextSnippet>, ContextError> {
        Ok(Vec::new())
    }
}
