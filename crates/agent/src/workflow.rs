//! The bounded workflow loop.
//!
//! route -> execute -> (repeat) -> synthesize, with three ways out before
//! the natural end: a clarification question suspends the run, a terminal
//! worker ends it with its own message, and the iteration cap stops
//! runaway plans.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use staffer_core::{
    AgentOutcome, ConversationState, Delegation, OutcomeStatus, RouterDecision, TurnMessage,
};

use crate::agents::AgentRegistry;
use crate::llm::CompletionClient;
use crate::router::Router;
use crate::synthesizer;

#[derive(Clone, Debug)]
pub struct WorkflowRequest {
    pub task: String,
    pub conversation_id: Option<String>,
    /// Prior turns, oldest first. The active task is not among them.
    pub messages: Vec<TurnMessage>,
    /// Caller-supplied side context, seeded into the run's task_context.
    pub context: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowResult {
    pub message: String,
    /// Worker whose reply the user is reading; None when the message came
    /// from the router or was synthesized across several workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub needs_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    pub outcomes: Vec<AgentOutcome>,
    /// Steps taken this run: the routing decision, every worker
    /// invocation, and the synthesis step each count as one.
    pub iteration_count: u32,
}

pub struct WorkflowController {
    router: Router,
    registry: AgentRegistry,
    llm: Arc<dyn CompletionClient>,
    max_iterations: u32,
}

impl WorkflowController {
    pub fn new(
        router: Router,
        registry: AgentRegistry,
        llm: Arc<dyn CompletionClient>,
        max_iterations: u32,
    ) -> Self {
        Self { router, registry, llm, max_iterations: max_iterations.max(1) }
    }

    pub async fn run(&self, request: WorkflowRequest) -> WorkflowResult {
        let mut state = ConversationState::new(
            request.task.clone(),
            request.conversation_id,
            request.messages,
            request.context,
        );

        // The routing decision is a step of its own.
        state.iteration_count += 1;
        match self.router.decide(&request.task, &state).await {
            RouterDecision::Clarify { question } => {
                info!(event_name = "workflow.router_clarification");
                return WorkflowResult {
                    message: question.clone(),
                    agent_name: None,
                    needs_clarification: true,
                    clarification_question: Some(question),
                    outcomes: Vec::new(),
                    iteration_count: state.iteration_count,
                };
            }
            RouterDecision::Delegate { plan, rationale } => {
                info!(
                    event_name = "workflow.plan",
                    delegations = plan.delegations.len(),
                    rationale = %rationale,
                );
                state
                    .task_context
                    .insert("routing_rationale".to_string(), serde_json::json!(rationale));
                state.remaining_delegations = plan.delegations.into();
            }
        }

        let mut truncated = false;
        while let Some(delegation) = state.remaining_delegations.pop_front() {
            if state.iteration_count >= self.max_iterations {
                warn!(
                    event_name = "workflow.iteration_limit",
                    limit = self.max_iterations,
                );
                truncated = true;
                break;
            }

            let outcome = match self.registry.get(delegation.agent) {
                Some(agent) => match agent.run(&delegation.task, &state).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(
                            event_name = "workflow.worker_failed",
                            agent = delegation.agent.name(),
                            error = %err,
                        );
                        AgentOutcome::error(
                            delegation.agent,
                            format!(
                                "The {} worker hit an error and couldn't finish.",
                                delegation.agent.name()
                            ),
                        )
                        .with_note(err.to_string())
                    }
                },
                None => AgentOutcome::error(
                    delegation.agent,
                    format!("No worker is registered for {}.", delegation.agent.name()),
                ),
            };

            let asks_clarification = outcome.status == OutcomeStatus::NeedsClarification;
            let question = outcome.clarification_question.clone();
            let terminal =
                outcome.agent.is_terminal() && outcome.status == OutcomeStatus::Success;
            let message = outcome.message.clone();
            let agent_name = outcome.agent.name().to_string();

            state.commit_step(outcome);

            if asks_clarification {
                // Suspend: the user answers, a later request resumes.
                return WorkflowResult {
                    message: message.clone(),
                    agent_name: Some(agent_name),
                    needs_clarification: true,
                    clarification_question: question.or(Some(message)),
                    outcomes: state.outcomes,
                    iteration_count: state.iteration_count,
                };
            }

            if terminal {
                // Remaining delegations are dropped.
                return WorkflowResult {
                    message,
                    agent_name: Some(agent_name),
                    needs_clarification: false,
                    clarification_question: None,
                    outcomes: state.outcomes,
                    iteration_count: state.iteration_count,
                };
            }

            // A hand-off hint queues the named worker next, ahead of the
            // rest of the plan. The iteration cap still bounds the chain.
            if let Some(next) = state.next_agent.take() {
                if self.registry.get(next).is_some() {
                    info!(event_name = "workflow.hand_off", to = next.name());
                    state.remaining_delegations.push_front(Delegation::new(
                        next,
                        delegation.task.clone(),
                        delegation.priority,
                    ));
                } else {
                    warn!(event_name = "workflow.hand_off_unregistered", to = next.name());
                }
            }
        }

        // Synthesis is the run's final counted step.
        state.iteration_count += 1;
        let mut message = synthesizer::synthesize(self.llm.as_ref(), &state).await;
        if truncated {
            message.push_str("\n\n(I stopped early: this request needed more steps than I allow in one run.)");
        }

        // Attributed only when exactly one worker spoke.
        let successes: Vec<&AgentOutcome> = state
            .outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Success)
            .collect();
        let agent_name = match successes.as_slice() {
            [only] => Some(only.agent.name().to_string()),
            _ => None,
        };

        WorkflowResult {
            message,
            agent_name,
            needs_clarification: false,
            clarification_question: None,
            outcomes: state.outcomes,
            iteration_count: state.iteration_count,
        }
    }
}
