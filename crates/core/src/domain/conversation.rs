use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::delegation::Delegation;
use super::outcome::{AgentKind, AgentOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), agent_name: None }
    }

    pub fn assistant(content: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            agent_name: Some(agent_name.into()),
        }
    }
}

/// Mutable state threaded through one workflow run. Created per request,
/// discarded after the run; callers persist only a digest of it.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    pub task: String,
    pub messages: Vec<TurnMessage>,
    pub task_context: BTreeMap<String, serde_json::Value>,
    pub outcomes: Vec<AgentOutcome>,
    pub next_agent: Option<AgentKind>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
    pub conversation_id: Option<String>,
    pub iteration_count: u32,
    /// Delegations the router queued beyond the one currently executing.
    pub remaining_delegations: VecDeque<Delegation>,
}

impl ConversationState {
    pub fn new(
        task: impl Into<String>,
        conversation_id: Option<String>,
        messages: Vec<TurnMessage>,
        task_context: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            task: task.into(),
            messages,
            task_context,
            conversation_id,
            ..Self::default()
        }
    }

    /// Prior user turns, oldest first. Used by stateful agents to replay
    /// history when re-seeding a pending action.
    pub fn prior_user_turns(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Commits a worker step atomically: the outcome and its user-facing
    /// message are appended together, never one without the other.
    pub fn commit_step(&mut self, outcome: AgentOutcome) {
        self.messages
            .push(TurnMessage::assistant(outcome.message.clone(), outcome.agent.name()));
        self.next_agent = outcome.next_agent;
        self.outcomes.push(outcome);
        self.iteration_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{OutcomePayload, OutcomeStatus};

    #[test]
    fn commit_step_appends_message_and_outcome_together() {
        let mut state = ConversationState::new("hello", None, Vec::new(), BTreeMap::new());
        let outcome = AgentOutcome {
            agent: AgentKind::Research,
            status: OutcomeStatus::Success,
            message: "done".to_string(),
            payload: OutcomePayload::None,
            next_agent: None,
            clarification_question: None,
            notes: Vec::new(),
        };

        state.commit_step(outcome);

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.outcomes.len(), 1);
        assert_eq!(state.iteration_count, 1);
        assert_eq!(state.messages[0].agent_name.as_deref(), Some("research"));
        assert_eq!(state.messages[0].content, "done");
    }

    #[test]
    fn prior_user_turns_filters_roles_in_order() {
        let mut state = ConversationState::default();
        state.messages = vec![
            TurnMessage::user("first"),
            TurnMessage::assistant("reply", "research"),
            TurnMessage::user("second"),
        ];

        let turns: Vec<&str> = state.prior_user_turns().collect();
        assert_eq!(turns, vec!["first", "second"]);
    }
}
