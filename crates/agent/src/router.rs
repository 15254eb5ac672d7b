//! The routing step: natural-language task -> delegation plan.
//!
//! The LLM proposes a plan as JSON; everything it says is validated
//! against the closed agent set, and any failure (transport, malformed
//! JSON, unknown agents, empty plan) falls back to the deterministic
//! keyword table. Routing can therefore never fail a request.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use staffer_core::routing::keyword_plan;
use staffer_core::{AgentKind, ConversationState, Delegation, DelegationPlan, RouterDecision};

use crate::llm::{extract_json_slice, CompletionClient};

const SYSTEM_PROMPT: &str = "You route tasks for a chief-of-staff assistant. \
    Available agents: scheduler (calendar events), messenger (email), research, \
    tasks (to-do lists), analytics (metrics), export (conversation transcript). \
    Respond with JSON only: {\"understanding\": \"...\", \"clarification_needed\": false, \
    \"clarification_question\": null, \"delegations\": [{\"agent\": \"scheduler\", \
    \"task\": \"...\", \"priority\": 1}]}. Ask a clarification only when the task is \
    genuinely ambiguous. No commentary outside the JSON.";

pub struct Router {
    llm: Arc<dyn CompletionClient>,
}

#[derive(Deserialize)]
struct RouterReply {
    #[serde(default)]
    understanding: String,
    #[serde(default)]
    clarification_needed: bool,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(default)]
    delegations: Vec<RawDelegation>,
}

#[derive(Deserialize)]
struct RawDelegation {
    agent: String,
    #[serde(default)]
    task: Option<String>,
    #[serde(default = "default_priority")]
    priority: u8,
}

fn default_priority() -> u8 {
    1
}

impl Router {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn decide(&self, task: &str, state: &ConversationState) -> RouterDecision {
        let context: Vec<String> =
            state.prior_user_turns().map(|turn| format!("- {turn}")).collect();
        let user_prompt = if context.is_empty() {
            format!("Task: {task}")
        } else {
            format!("Earlier user turns:\n{}\n\nTask: {task}", context.join("\n"))
        };

        let reply = match self.llm.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => extract_json_slice(&raw)
                .and_then(|slice| serde_json::from_str::<RouterReply>(slice).ok()),
            Err(err) => {
                debug!(event_name = "router.llm_failed", error = %err);
                None
            }
        };

        let Some(reply) = reply else {
            info!(event_name = "router.keyword_fallback");
            return RouterDecision::Delegate {
                plan: keyword_plan(task),
                rationale: "keyword fallback".to_string(),
            };
        };

        if reply.clarification_needed {
            if let Some(question) =
                reply.clarification_question.filter(|q| !q.trim().is_empty())
            {
                return RouterDecision::Clarify { question };
            }
        }

        // Unknown agent names are dropped, not guessed at.
        let delegations: Vec<Delegation> = reply
            .delegations
            .into_iter()
            .filter_map(|raw| {
                let agent = AgentKind::parse(&raw.agent)?;
                let subtask = raw.task.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| task.to_string());
                Some(Delegation::new(agent, subtask, raw.priority.max(1)))
            })
            .collect();

        if delegations.is_empty() {
            info!(event_name = "router.keyword_fallback");
            return RouterDecision::Delegate {
                plan: keyword_plan(task),
                rationale: "keyword fallback".to_string(),
            };
        }

        RouterDecision::Delegate {
            plan: DelegationPlan::new(delegations),
            rationale: reply.understanding,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::testing::ScriptedLlm;

    fn state() -> ConversationState {
        ConversationState::new("", None, Vec::new(), BTreeMap::new())
    }

    #[tokio::test]
    async fn model_plan_is_validated_and_ordered() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"understanding": "book then notify", "clarification_needed": false,
                "delegations": [
                    {"agent": "email", "task": "tell dana", "priority": 2},
                    {"agent": "calendar", "task": "book the sync", "priority": 1},
                    {"agent": "weather", "task": "??", "priority": 1}
                ]}"#,
        ]));
        let router = Router::new(llm);

        let RouterDecision::Delegate { plan, rationale } =
            router.decide("book a sync and tell dana", &state()).await
        else {
            panic!("expected a delegation");
        };

        let agents: Vec<AgentKind> = plan.delegations.iter().map(|d| d.agent).collect();
        assert_eq!(agents, vec![AgentKind::Scheduler, AgentKind::Messenger]);
        assert_eq!(rationale, "book then notify");
    }

    #[tokio::test]
    async fn clarification_passes_through() {
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"understanding": "", "clarification_needed": true,
                "clarification_question": "Which project do you mean?", "delegations": []}"#,
        ]));
        let router = Router::new(llm);

        let decision = router.decide("handle the thing", &state()).await;
        assert_eq!(
            decision,
            RouterDecision::Clarify { question: "Which project do you mean?".to_string() }
        );
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_keywords() {
        let router = Router::new(Arc::new(ScriptedLlm::failing()));

        let RouterDecision::Delegate { plan, rationale } =
            router.decide("schedule a meeting", &state()).await
        else {
            panic!("expected a delegation");
        };

        assert_eq!(plan.first().map(|d| d.agent), Some(AgentKind::Scheduler));
        assert_eq!(rationale, "keyword fallback");
    }

    #[tokio::test]
    async fn garbage_json_falls_back_to_keywords() {
        let llm = Arc::new(ScriptedLlm::with_replies(["I think you should relax today."]));
        let router = Router::new(llm);

        let RouterDecision::Delegate { plan, .. } =
            router.decide("email dana the notes", &state()).await
        else {
            panic!("expected a delegation");
        };
        assert_eq!(plan.first().map(|d| d.agent), Some(AgentKind::Messenger));
    }
}
