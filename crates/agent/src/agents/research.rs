//! The research worker. LLM-backed; degrades to a plain-prose finding
//! when the model ignores the JSON contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use staffer_core::domain::outcome::Finding;
use staffer_core::{AgentKind, AgentOutcome, ConversationState, OutcomePayload};

use super::{Agent, AgentError};
use crate::context::{ContextFilters, ContextRetriever};
use crate::llm::{extract_json_slice, CompletionClient};

const SYSTEM_PROMPT: &str = "You are a research assistant. Answer the task with JSON only: \
    {\"summary\": \"...\", \"findings\": [{\"title\": \"...\", \"content\": \"...\", \
    \"source\": null}], \"key_insights\": [\"...\"]}. Add \"next_agent\": \
    \"scheduler|messenger|tasks|analytics\" only when another worker must continue the \
    job. No commentary outside the JSON.";

pub struct ResearchAgent {
    llm: Arc<dyn CompletionClient>,
    retriever: Arc<dyn ContextRetriever>,
}

#[derive(Deserialize)]
struct ResearchReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    next_agent: Option<String>,
}

impl ResearchAgent {
    pub fn new(llm: Arc<dyn CompletionClient>, retriever: Arc<dyn ContextRetriever>) -> Self {
        Self { llm, retriever }
    }

    /// Retrieval is enrichment only; a failed or empty lookup leaves the
    /// prompt as the bare task.
    async fn enriched_prompt(&self, task: &str) -> String {
        let snippets = match self
            .retriever
            .retrieve(task, &ContextFilters { limit: 5, ..ContextFilters::default() })
            .await
        {
            Ok(snippets) => snippets,
            Err(err) => {
                debug!(event_name = "research.context_unavailable", error = %err);
                Vec::new()
            }
        };

        if snippets.is_empty() {
            return task.to_string();
        }

        let mut prompt = String::from(task);
        prompt.push_str("\n\nRelevant context:\n");
        for snippet in snippets {
            prompt.push_str("- ");
            prompt.push_str(&snippet.content);
            prompt.push('\n');
        }
        prompt
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Research
    }

    async fn run(
        &self,
        task: &str,
        _state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let prompt = self.enriched_prompt(task).await;
        let raw = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;

        let parsed = extract_json_slice(&raw)
            .and_then(|slice| serde_json::from_str::<ResearchReply>(slice).ok());

        let outcome = match parsed {
            Some(reply) => {
                let message = if reply.summary.trim().is_empty() {
                    raw.trim().to_string()
                } else {
                    reply.summary
                };
                let payload = OutcomePayload::Research {
                    topic: task.to_string(),
                    findings: reply.findings,
                    key_insights: reply.key_insights,
                };
                match reply.next_agent.as_deref().and_then(AgentKind::parse) {
                    Some(next) => {
                        AgentOutcome::delegated(AgentKind::Research, message, payload, next)
                    }
                    None => AgentOutcome::success(AgentKind::Research, message, payload),
                }
            }
            None => {
                debug!(event_name = "research.unstructured_reply");
                AgentOutcome::success(
                    AgentKind::Research,
                    raw.trim().to_string(),
                    OutcomePayload::Research {
                        topic: task.to_string(),
                        findings: vec![Finding {
                            title: "Summary".to_string(),
                            content: raw.trim().to_string(),
                            source: None,
                        }],
                        key_insights: Vec::new(),
                    },
                )
            }
        };

        Ok(outcome)
    }
}
