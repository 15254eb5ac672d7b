//! The transcript export worker. Terminal: its result is the final reply
//! and any remaining delegations are dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use staffer_core::{AgentKind, AgentOutcome, ConversationState, OutcomePayload, Role};
use staffer_db::MetadataRepository;

use super::{Agent, AgentError};

/// Synthetic conversation id the exports live under; export ids are
/// unguessable UUIDs so no further scoping is needed.
pub const EXPORT_SCOPE: &str = "exports";

pub struct ExportAgent {
    repository: Arc<dyn MetadataRepository>,
    public_base_url: String,
}

impl ExportAgent {
    pub fn new(repository: Arc<dyn MetadataRepository>, public_base_url: impl Into<String>) -> Self {
        Self {
            repository,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn render_transcript(state: &ConversationState) -> String {
        let mut lines = Vec::with_capacity(state.messages.len() + 1);
        for message in &state.messages {
            let speaker = match message.role {
                Role::User => "User".to_string(),
                Role::Assistant => {
                    format!("Assistant ({})", message.agent_name.as_deref().unwrap_or("assistant"))
                }
                Role::System => "System".to_string(),
            };
            lines.push(format!("{speaker}: {}", message.content));
        }
        lines.push(format!("User: {}", state.task));
        lines.join("\n")
    }
}

#[async_trait]
impl Agent for ExportAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Export
    }

    async fn run(
        &self,
        _task: &str,
        state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let export_id = Uuid::new_v4().to_string();
        let transcript = Self::render_transcript(state);

        self.repository
            .put(
                EXPORT_SCOPE,
                &export_id,
                json!({
                    "conversation_id": state.conversation_id,
                    "content": transcript,
                }),
            )
            .await
            .map_err(staffer_db::StoreError::from)?;

        let download_url = format!("{}/api/exports/{export_id}", self.public_base_url);
        info!(event_name = "export.transcript_saved", export_id = %export_id);

        Ok(AgentOutcome::success(
            AgentKind::Export,
            format!("Your conversation transcript is ready: {download_url}"),
            OutcomePayload::Export { download_url },
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use staffer_core::{OutcomeStatus, TurnMessage};
    use staffer_db::repositories::InMemoryMetadataRepository;

    use super::*;

    #[tokio::test]
    async fn export_persists_transcript_and_links_it() {
        let repository = Arc::new(InMemoryMetadataRepository::default());
        let agent = ExportAgent::new(repository.clone(), "http://localhost:8080/");

        let state = ConversationState::new(
            "export this chat",
            Some("conv-1".to_string()),
            vec![
                TurnMessage::user("schedule a sync"),
                TurnMessage::assistant("Which day?", "scheduler"),
            ],
            BTreeMap::new(),
        );

        let outcome = agent.run("export this chat", &state).await.expect("run");

        assert_eq!(outcome.status, OutcomeStatus::Success);
        let OutcomePayload::Export { download_url } = &outcome.payload else {
            panic!("expected export payload");
        };
        let export_id = download_url.rsplit('/').next().expect("id");
        assert!(download_url.starts_with("http://localhost:8080/api/exports/"));

        let stored = repository
            .get(EXPORT_SCOPE, export_id)
            .await
            .expect("get")
            .expect("stored");
        let content = stored["content"].as_str().expect("content");
        assert!(content.contains("User: schedule a sync"));
        assert!(content.contains("Assistant (scheduler): Which day?"));
        assert!(content.ends_with("User: export this chat"));
    }

    #[tokio::test]
    async fn export_is_the_terminal_agent() {
        assert!(AgentKind::Export.is_terminal());
    }
}
