use serde::{Deserialize, Serialize};

/// The closed set of worker agents. Routing data referring to anything
/// outside this set is dropped, not guessed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Scheduler,
    Messenger,
    Research,
    Tasks,
    Analytics,
    Export,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Scheduler,
        AgentKind::Messenger,
        AgentKind::Research,
        AgentKind::Tasks,
        AgentKind::Analytics,
        AgentKind::Export,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scheduler => "scheduler",
            Self::Messenger => "messenger",
            Self::Research => "research",
            Self::Tasks => "tasks",
            Self::Analytics => "analytics",
            Self::Export => "export",
        }
    }

    /// Case-insensitive parse accepting the legacy category names used by
    /// the routing model ("calendar", "email", "task", "pdf") as well as
    /// our own.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduler" | "calendar" => Some(Self::Scheduler),
            "messenger" | "email" => Some(Self::Messenger),
            "research" => Some(Self::Research),
            "tasks" | "task" => Some(Self::Tasks),
            "analytics" => Some(Self::Analytics),
            "export" | "pdf" => Some(Self::Export),
            _ => None,
        }
    }

    /// Export ends the run immediately; remaining delegations are dropped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Export)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    NeedsClarification,
    Delegated,
    Error,
}

/// One payload shape per concrete worker; a closed union rather than an
/// open JSON dictionary so downstream code cannot read fields a worker
/// never produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomePayload {
    Schedule {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_link: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meet_link: Option<String>,
    },
    Message {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },
    Research {
        topic: String,
        findings: Vec<Finding>,
        key_insights: Vec<String>,
    },
    Tasks {
        action: String,
        items: Vec<String>,
    },
    Analytics {
        metric: String,
        summary: String,
    },
    Export {
        download_url: String,
    },
    Routing {
        understanding: String,
        rationale: String,
    },
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Immutable record of one worker invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent: AgentKind,
    pub status: OutcomeStatus,
    pub message: String,
    pub payload: OutcomePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<AgentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl AgentOutcome {
    pub fn success(agent: AgentKind, message: impl Into<String>, payload: OutcomePayload) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Success,
            message: message.into(),
            payload,
            next_agent: None,
            clarification_question: None,
            notes: Vec::new(),
        }
    }

    /// A finished step whose result another worker should pick up. The
    /// controller queues `next` ahead of the remaining delegations.
    pub fn delegated(
        agent: AgentKind,
        message: impl Into<String>,
        payload: OutcomePayload,
        next: AgentKind,
    ) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Delegated,
            message: message.into(),
            payload,
            next_agent: Some(next),
            clarification_question: None,
            notes: Vec::new(),
        }
    }

    pub fn clarification(agent: AgentKind, question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            agent,
            status: OutcomeStatus::NeedsClarification,
            message: question.clone(),
            payload: OutcomePayload::None,
            next_agent: None,
            clarification_question: Some(question),
            notes: Vec::new(),
        }
    }

    pub fn error(agent: AgentKind, message: impl Into<String>) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Error,
            message: message.into(),
            payload: OutcomePayload::None,
            next_agent: None,
            clarification_question: None,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_kind_parse_accepts_legacy_category_names() {
        assert_eq!(AgentKind::parse("CALENDAR"), Some(AgentKind::Scheduler));
        assert_eq!(AgentKind::parse("email"), Some(AgentKind::Messenger));
        assert_eq!(AgentKind::parse("pdf"), Some(AgentKind::Export));
        assert_eq!(AgentKind::parse("task"), Some(AgentKind::Tasks));
        assert_eq!(AgentKind::parse("weather"), None);
    }

    #[test]
    fn only_export_is_terminal() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.is_terminal(), kind == AgentKind::Export);
        }
    }

    #[test]
    fn delegated_outcome_carries_the_hand_off_hint() {
        let outcome = AgentOutcome::delegated(
            AgentKind::Research,
            "Findings ready.",
            OutcomePayload::None,
            AgentKind::Tasks,
        );
        assert_eq!(outcome.status, OutcomeStatus::Delegated);
        assert_eq!(outcome.next_agent, Some(AgentKind::Tasks));
    }

    #[test]
    fn clarification_outcome_mirrors_question_into_message() {
        let outcome = AgentOutcome::clarification(AgentKind::Scheduler, "Which day?");
        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert_eq!(outcome.message, "Which day?");
        assert_eq!(outcome.clarification_question.as_deref(), Some("Which day?"));
    }
}
