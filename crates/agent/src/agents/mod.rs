use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use staffer_core::{AgentKind, AgentOutcome, ConversationState};
use staffer_db::StoreError;

use crate::delivery::{CalendarError, MailError};
use crate::llm::LlmError;

pub mod analytics;
pub mod export;
pub mod messenger;
pub mod research;
pub mod scheduler;
pub mod tasks;

pub use analytics::AnalyticsAgent;
pub use export::ExportAgent;
pub use messenger::MessengerAgent;
pub use research::ResearchAgent;
pub use scheduler::SchedulerAgent;
pub use tasks::TasksAgent;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// One worker. Workers read the conversation but never mutate it; the
/// controller commits their outcome.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn run(&self, task: &str, state: &ConversationState)
        -> Result<AgentOutcome, AgentError>;
}

#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&kind)
    }
}
