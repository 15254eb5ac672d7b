//! The analytics worker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use staffer_core::{AgentKind, AgentOutcome, ConversationState, OutcomePayload};

use super::{Agent, AgentError};
use crate::llm::{extract_json_slice, CompletionClient};

const SYSTEM_PROMPT: &str = "You analyze metrics and trends. Answer with JSON only: \
    {\"metric\": \"...\", \"summary\": \"...\"}. Add \"next_agent\": \
    \"scheduler|messenger|research|tasks\" only when another worker must continue the \
    job. No commentary.";

pub struct AnalyticsAgent {
    llm: Arc<dyn CompletionClient>,
}

#[derive(Deserialize)]
struct AnalyticsReply {
    #[serde(default)]
    metric: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    next_agent: Option<String>,
}

impl AnalyticsAgent {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for AnalyticsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Analytics
    }

    async fn run(
        &self,
        task: &str,
        _state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let raw = self.llm.complete(SYSTEM_PROMPT, task).await?;

        let parsed = extract_json_slice(&raw)
            .and_then(|slice| serde_json::from_str::<AnalyticsReply>(slice).ok());

        Ok(match parsed {
            Some(reply) if !reply.summary.trim().is_empty() => {
                let payload = OutcomePayload::Analytics {
                    metric: reply.metric,
                    summary: reply.summary.clone(),
                };
                match reply.next_agent.as_deref().and_then(AgentKind::parse) {
                    Some(next) => AgentOutcome::delegated(
                        AgentKind::Analytics,
                        reply.summary,
                        payload,
                        next,
                    ),
                    None => AgentOutcome::success(AgentKind::Analytics, reply.summary, payload),
                }
            }
            _ => AgentOutcome::success(
                AgentKind::Analytics,
                raw.trim().to_string(),
                OutcomePayload::Analytics {
                    metric: task.to_string(),
                    summary: raw.trim().to_string(),
                },
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
    async fn summary_becomes_the_message() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"metric": "weekly meetings", "summary": "Meetings are up 20% week over week."}"#,
        ]));
        let agent = AnalyticsAgent::new(llm);
        let state = ConversationState::new("", None, Vec::new(), BTreeMap::new());

        let outcome = agent.run("how are my meetings trending", &state).await.expect("run");
        assert_eq!(outcome.message, "Meetings are up 20% week over week.");
    }
}
