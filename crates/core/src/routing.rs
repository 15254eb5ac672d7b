//! Deterministic keyword routing fallback.
//!
//! Used whenever the routing model returns nothing parseable. Scoring is
//! plain substring matching over the lowercased task; matched categories
//! come back at priority 1 in fixed table order, so identical input always
//! yields the identical plan.

use crate::domain::delegation::{Delegation, DelegationPlan};
use crate::domain::outcome::AgentKind;

/// Fixed keyword table. Order matters: it is the tie-break between
/// categories that all matched.
pub const KEYWORD_TABLE: &[(AgentKind, &[&str])] = &[
    (
        AgentKind::Scheduler,
        &[
            "schedule", "meeting", "appointment", "calendar", "event", "time", "book",
            "reschedule", "availability", "remind",
        ],
    ),
    (
        AgentKind::Messenger,
        &["email", "mail", "message", "send", "reply", "draft", "inbox", "compose", "forward", "cc"],
    ),
    (
        AgentKind::Research,
        &[
            "research", "find", "search", "look up", "information", "learn", "analyze",
            "report", "study", "investigate",
        ],
    ),
    (
        AgentKind::Tasks,
        &[
            "task", "todo", "to-do", "deadline", "project", "assign", "complete", "priority",
            "checklist", "milestone",
        ],
    ),
    (
        AgentKind::Analytics,
        &[
            "analytics", "data", "metrics", "chart", "graph", "trend", "kpi", "dashboard",
            "statistics", "performance",
        ],
    ),
    (
        AgentKind::Export,
        &["pdf", "download", "export", "transcript", "chat history", "conversation history", "save chat"],
    ),
];

/// Builds the fallback plan for `task`. Never empty: with no keyword hit
/// the task goes to research.
pub fn keyword_plan(task: &str) -> DelegationPlan {
    let lowered = task.to_lowercase();

    let mut delegations: Vec<Delegation> = KEYWORD_TABLE
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(agent, _)| {
            Delegation::new(*agent, task, 1).with_context("keyword match fallback")
        })
        .collect();

    if delegations.is_empty() {
        delegations
            .push(Delegation::new(AgentKind::Research, task, 1).with_context("default delegation"));
    }

    DelegationPlan::new(delegations)
}
