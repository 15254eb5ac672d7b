//! Domain core for the staffer assistant.
//!
//! Everything in this crate is deterministic and free of I/O: the
//! conversation/outcome data model, the rule-based entity extractor, the
//! confirmation gatekeeper that decides when a pending action may actually
//! be executed, and the keyword routing fallback. The agent runtime and
//! persistence layers build on these types; they never re-implement the
//! decisions made here.
//!
//! # Safety principle
//!
//! The LLM proposes; this crate disposes. Whether an event gets booked or a
//! message gets sent is decided by `gatekeeper`, never by model output.

pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod gatekeeper;
pub mod routing;

pub use chrono;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::conversation::{ConversationState, Role, TurnMessage};
pub use domain::delegation::{Delegation, DelegationPlan, RouterDecision};
pub use domain::outcome::{AgentKind, AgentOutcome, OutcomePayload, OutcomeStatus};
pub use domain::pending::{
    Attendee, AvailabilityCheck, CheckStatus, PendingEvent, PendingMessage,
};
pub use errors::{parse_timezone, DomainError};
pub use gatekeeper::{GateConfig, GateDecision, MissingField, TurnIntent};
