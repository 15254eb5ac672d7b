//! The task-management worker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use staffer_core::{AgentKind, AgentOutcome, ConversationState, OutcomePayload};

use super::{Agent, AgentError};
use crate::llm::{extract_json_slice, CompletionClient};

const SYSTEM_PROMPT: &str = "You manage task lists. Answer with JSON only: \
    {\"action\": \"...\", \"items\": [\"...\"], \"summary\": \"...\"}. Add \"next_agent\": \
    \"scheduler|messenger|research|analytics\" only when another worker must continue \
    the job. No commentary.";

pub struct TasksAgent {
    llm: Arc<dyn CompletionClient>,
}

#[derive(Deserialize)]
struct TasksReply {
    #[serde(default)]
    action: String,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    next_agent: Option<String>,
}

impl TasksAgent {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for TasksAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Tasks
    }

    async fn run(
        &self,
        task: &str,
        _state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let raw = self.llm.complete(SYSTEM_PROMPT, task).await?;

        let parsed = extract_json_slice(&raw)
            .and_then(|slice| serde_json::from_str::<TasksReply>(slice).ok());

        Ok(match parsed {
            Some(reply) => {
                let message = if reply.summary.trim().is_empty() {
                    raw.trim().to_string()
                } else {
                    reply.summary
                };
                let payload =
                    OutcomePayload::Tasks { action: reply.action, items: reply.items };
                match reply.next_agent.as_deref().and_then(AgentKind::parse) {
                    Some(next) => {
                        AgentOutcome::delegated(AgentKind::Tasks, message, payload, next)
                    }
                    None => AgentOutcome::success(AgentKind::Tasks, message, payload),
                }
            }
            None => AgentOutcome::success(
                AgentKind::Tasks,
                raw.trim().to_string(),
                OutcomePayload::Tasks { action: "noted".to_string(), items: Vec::new() },
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn items_come_back_in_the_payload() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"action": "created", "items": ["book venue", "send invites"], "summary": "Two tasks created."}"#,
        ]));
        let agent = TasksAgent::new(llm);
        let state = ConversationState::new("", None, Vec::new(), BTreeMap::new());

        let outcome = agent.run("plan the offsite", &state).await.expect("run");

        assert_eq!(outcome.message, "Two tasks created.");
        assert!(matches!(
            outcome.payload,
            OutcomePayload::Tasks { ref items, .. } if items.len() == 2
        ));
        assert_eq!(outcome.next_agent, None);
    }

    #[tokio::test]
    async fn hand_off_hint_marks_the_outcome_delegated() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"action": "created", "items": ["send the invite list"],
                "summary": "Checklist ready.", "next_agent": "messenger"}"#,
        ]));
        let agent = TasksAgent::new(llm);
        let state = ConversationState::new("", None, Vec::new(), BTreeMap::new());

        let outcome = agent.run("prep the launch", &state).await.expect("run");

        assert_eq!(outcome.status, staffer_core::OutcomeStatus::Delegated);
        assert_eq!(outcome.next_agent, Some(AgentKind::Messenger));
    }
}
