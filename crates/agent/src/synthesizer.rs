//! Final-reply synthesis.
//!
//! Collapses the run's worker outcomes into one user-facing message. The
//! LLM only rephrases; with zero or one substantive outcome there is
//! nothing to rephrase and it is not consulted at all, and any LLM
//! failure degrades to the deterministic join.

use tracing::debug;

use staffer_core::{ConversationState, OutcomeStatus};

use crate::llm::CompletionClient;

pub const NO_RESULTS_MESSAGE: &str =
    "I wasn't able to produce any results for that request.";

const SYSTEM_PROMPT: &str = "You summarize what an assistant's workers accomplished into one \
    short, direct reply to the user. Mention every completed action. Plain text only.";

pub async fn synthesize(llm: &dyn CompletionClient, state: &ConversationState) -> String {
    let substantive: Vec<&str> = state
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Success)
        .map(|o| o.message.as_str())
        .collect();

    match substantive.as_slice() {
        [] => {
            // Errors alone still deserve an honest reply.
            let failures: Vec<&str> = state
                .outcomes
                .iter()
                .filter(|o| o.status == OutcomeStatus::Error)
                .map(|o| o.message.as_str())
                .collect();
            if failures.is_empty() {
                NO_RESULTS_MESSAGE.to_string()
            } else {
                failures.join("\n\n")
            }
        }
        [single] => (*single).to_string(),
        many => {
            let joined = many.join("\n\n");
            match llm.complete(SYSTEM_PROMPT, &joined).await {
                Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
                Ok(_) => joined,
                Err(err) => {
                    debug!(event_name = "synthesizer.llm_failed", error = %err);
                    joined
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use staffer_core::{AgentKind, AgentOutcome, OutcomePayload};

    use super::*;
    use crate::testing::ScriptedLlm;

    fn state_with(outcomes: Vec<AgentOutcome>) -> ConversationState {
        let mut state = ConversationState::new("", None, Vec::new(), BTreeMap::new());
        state.outcomes = outcomes;
        state
    }

    #[tokio::test]
    async fn no_outcomes_yields_the_fixed_message() {
        let llm = ScriptedLlm::failing();
        let reply = synthesize(&llm, &state_with(Vec::new())).await;
        assert_eq!(reply, NO_RESULTS_MESSAGE);
    }

    #[tokio::test]
    async fn single_outcome_passes_through_without_the_llm() {
        let llm = ScriptedLlm::failing();
        let outcome =
            AgentOutcome::success(AgentKind::Research, "Found it.", OutcomePayload::None);

        let reply = synthesize(&llm, &state_with(vec![outcome])).await;
        assert_eq!(reply, "Found it.");
    }

    #[tokio::test]
    async fn multiple_outcomes_are_summarized() {
        let llm = ScriptedLlm::with_replies(["Booked the sync and told Dana."]);
        let outcomes = vec![
            AgentOutcome::success(AgentKind::Scheduler, "Booked.", OutcomePayload::None),
            AgentOutcome::success(AgentKind::Messenger, "Sent.", OutcomePayload::None),
        ];

        let reply = synthesize(&llm, &state_with(outcomes)).await;
        assert_eq!(reply, "Booked the sync and told Dana.");
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_the_joined_messages() {
        let llm = ScriptedLlm::failing();
        let outcomes = vec![
            AgentOutcome::success(AgentKind::Scheduler, "Booked.", OutcomePayload::None),
            AgentOutcome::success(AgentKind::Messenger, "Sent.", OutcomePayload::None),
        ];

        let reply = synthesize(&llm, &state_with(outcomes)).await;
        assert_eq!(reply, "Booked.\n\nSent.");
    }

    #[tokio::test]
    async fn errors_alone_are_reported_honestly() {
        let llm = ScriptedLlm::failing();
        let outcomes = vec![AgentOutcome::error(AgentKind::Research, "The lookup failed.")];

        let reply = synthesize(&llm, &state_with(outcomes)).await;
        assert_eq!(reply, "The lookup failed.");
    }
}
