//! Confirmation gatekeeper.
//!
//! Pure decision logic between an accumulated pending action and the
//! irreversible side effect. The rule is strict: a send happens only on a
//! confirmation turn, with every required field present, a fresh clear
//! availability check, and nothing blocked. Everything else is a prompt
//! back to the user.

use chrono::{DateTime, Utc};

use crate::domain::pending::{CheckStatus, PendingEvent, PendingMessage};
use crate::extract::phrases;

pub const DEFAULT_CHECK_TTL_SECS: i64 = 300;

#[derive(Clone, Copy, Debug)]
pub struct GateConfig {
    /// Maximum age of a cached availability check before it must be redone.
    pub check_ttl_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { check_ttl_secs: DEFAULT_CHECK_TTL_SECS }
    }
}

/// How the current turn reads as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnIntent {
    Confirmation,
    Cancellation,
    Statement,
}

impl TurnIntent {
    pub fn classify(text: &str) -> Self {
        if phrases::is_confirmation(text) {
            Self::Confirmation
        } else if phrases::is_cancellation(text) {
            Self::Cancellation
        } else {
            Self::Statement
        }
    }
}

/// Required fields, reported individually and in a fixed order: title,
/// date, time, then an email per named attendee (scheduling); recipient,
/// subject, body (messages).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissingField {
    Title,
    Date,
    Time,
    AttendeeEmail(String),
    Recipient,
    Subject,
    Body,
}

impl MissingField {
    pub fn describe(&self) -> String {
        match self {
            Self::Title => "a title for the event".to_string(),
            Self::Date => "the date".to_string(),
            Self::Time => "the time".to_string(),
            Self::AttendeeEmail(name) => format!("an email address for {name}"),
            Self::Recipient => "the recipient's email address".to_string(),
            Self::Subject => "a subject line".to_string(),
            Self::Body => "the message body".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Stay collecting; ask for exactly these fields.
    AskMissing(Vec<MissingField>),
    /// Explicit cancellation: clear the pending action, no side effect.
    Cancel,
    /// Fields complete but no trustworthy check; consult the calendar.
    CheckAvailability,
    /// Fields complete and clear; re-present the details for sign-off.
    AwaitConfirmation,
    /// Confirmation turn with everything satisfied: perform the send.
    Send,
    /// The fresh check says conflict; sending stays blocked until the
    /// date/time changes.
    Blocked,
}

pub fn missing_event_fields(event: &PendingEvent) -> Vec<MissingField> {
    let mut missing = Vec::new();
    if event.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
        missing.push(MissingField::Title);
    }
    if event.date.is_none() {
        missing.push(MissingField::Date);
    }
    if event.time.is_none() {
        missing.push(MissingField::Time);
    }
    for attendee in &event.attendees {
        if attendee.email.as_deref().map_or(true, |e| e.trim().is_empty()) {
            let who = attendee.name.clone().unwrap_or_else(|| "the attendee".to_string());
            missing.push(MissingField::AttendeeEmail(who));
        }
    }
    missing
}

pub fn missing_message_fields(message: &PendingMessage) -> Vec<MissingField> {
    let mut missing = Vec::new();
    if message.recipient_email.as_deref().map_or(true, |e| e.trim().is_empty()) {
        missing.push(MissingField::Recipient);
    }
    if message.subject.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push(MissingField::Subject);
    }
    if message.body.as_deref().map_or(true, |b| b.trim().is_empty()) {
        missing.push(MissingField::Body);
    }
    missing
}

/// One prompt naming each missing field individually.
pub fn format_missing_prompt(missing: &[MissingField]) -> String {
    let described: Vec<String> = missing.iter().map(MissingField::describe).collect();
    let list = match described.len() {
        0 => return "I have everything I need.".to_string(),
        1 => described[0].clone(),
        2 => format!("{} and {}", described[0], described[1]),
        _ => {
            let (last, rest) = described.split_last().unwrap_or((&described[0], &[]));
            format!("{}, and {}", rest.join(", "), last)
        }
    };
    format!("I still need {list}.")
}

/// The scheduling gate. Callers run it, perform any requested I/O
/// (recording the result on the event), and run it again.
pub fn decide_event(
    event: &PendingEvent,
    intent: TurnIntent,
    now: DateTime<Utc>,
    config: &GateConfig,
) -> GateDecision {
    if intent == TurnIntent::Cancellation {
        return GateDecision::Cancel;
    }

    let missing = missing_event_fields(event);
    if !missing.is_empty() {
        return GateDecision::AskMissing(missing);
    }

    // Fields are complete from here on; unwrap-free via the checks above.
    let (Some(date), Some(time)) = (event.date, event.time) else {
        return GateDecision::AskMissing(vec![MissingField::Date, MissingField::Time]);
    };
    let duration = event.duration_minutes();

    match &event.availability_check {
        Some(check) if check.is_fresh(date, time, duration, now, config.check_ttl_secs) => {
            match check.status {
                CheckStatus::Conflict => GateDecision::Blocked,
                CheckStatus::Clear => {
                    if intent == TurnIntent::Confirmation {
                        GateDecision::Send
                    } else {
                        GateDecision::AwaitConfirmation
                    }
                }
            }
        }
        // Absent or stale: never trust it, even on a confirmation turn.
        _ => GateDecision::CheckAvailability,
    }
}

/// The message gate. No calendar involved; completeness plus an explicit
/// confirmation is the whole contract.
pub fn decide_message(message: &PendingMessage, intent: TurnIntent) -> GateDecision {
    if intent == TurnIntent::Cancellation {
        return GateDecision::Cancel;
    }

    let missing = missing_message_fields(message);
    if !missing.is_empty() {
        return GateDecision::AskMissing(missing);
    }

    if intent == TurnIntent::Confirmation {
        GateDecision::Send
    } else {
        GateDecision::AwaitConfirmation
    }
}
