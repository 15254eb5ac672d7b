use serde::{Deserialize, Serialize};

use super::outcome::AgentKind;

/// A routing decision assigning a task to one worker. Priority 1 is the
/// highest; ties keep their original order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub agent: AgentKind,
    pub task: String,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Delegation {
    pub fn new(agent: AgentKind, task: impl Into<String>, priority: u8) -> Self {
        Self { agent, task: task.into(), priority, context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPlan {
    pub delegations: Vec<Delegation>,
}

impl DelegationPlan {
    pub fn new(mut delegations: Vec<Delegation>) -> Self {
        // Stable: equal priorities keep the order the router proposed.
        delegations.sort_by_key(|d| d.priority);
        Self { delegations }
    }

    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }

    pub fn first(&self) -> Option<&Delegation> {
        self.delegations.first()
    }
}

/// The router always produces one of these two; "neither a delegation nor
/// a question" is unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterDecision {
    Clarify { question: String },
    Delegate { plan: DelegationPlan, rationale: String },
}
