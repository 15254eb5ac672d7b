//! Test doubles for the collaborator seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use staffer_core::domain::pending::{CheckStatus, PendingEvent};

use crate::context::{ContextError, ContextFilters, ContextRetriever, ContextSnippet};
use crate::delivery::{BookedEvent, CalendarDelivery, CalendarError, MailDelivery, MailError, OutgoingMail};
use crate::llm::{CompletionClient, LlmError};

/// A calendar with a fixed availability verdict and an in-memory record of
/// everything created through it.
pub struct StaticCalendar {
    status: CheckStatus,
    check_fails: AtomicBool,
    booking_fails: AtomicBool,
    created: AtomicUsize,
}

impl StaticCalendar {
    pub fn clear() -> Self {
        Self {
            status: CheckStatus::Clear,
            check_fails: AtomicBool::new(false),
            booking_fails: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        }
    }

    pub fn conflicted() -> Self {
        Self { status: CheckStatus::Conflict, ..Self::clear() }
    }

    pub fn clear_but_booking_fails() -> Self {
        let calendar = Self::clear();
        calendar.booking_fails.store(true, Ordering::SeqCst);
        calendar
    }

    /// Every call fails, as if the calendar service were down.
    pub fn unreachable() -> Self {
        let calendar = Self::clear();
        calendar.check_fails.store(true, Ordering::SeqCst);
        calendar.booking_fails.store(true, Ordering::SeqCst);
        calendar
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarDelivery for StaticCalendar {
    async fn check_conflict(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<CheckStatus, CalendarError> {
        if self.check_fails.load(Ordering::SeqCst) {
            return Err(CalendarError::Status(503));
        }
        Ok(self.status)
    }

    async fn create_event(
        &self,
        _event: &PendingEvent,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BookedEvent, CalendarError> {
        if self.booking_fails.load(Ordering::SeqCst) {
            return Err(CalendarError::Status(503));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BookedEvent {
            event_id: format!("evt-{n}"),
            event_link: Some(format!("https://calendar.example/evt-{n}")),
            meet_link: None,
        })
    }
}

/// Replays canned completions in order; empty script means failure. Every
/// prompt pair is recorded so tests can assert on what was asked.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn with_replies(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    /// (system, user) prompt pairs in call order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((system.to_string(), user.to_string()));
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        replies.pop_front().ok_or(LlmError::EmptyResponse)
    }
}

/// A retriever with a fixed snippet list.
pub struct StaticRetriever {
    snippets: Vec<ContextSnippet>,
}

impl StaticRetriever {
    pub fn with_snippets(contents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            snippets: contents
                .into_iter()
                .map(|content| ContextSnippet {
                    content: content.into(),
                    source: None,
                    score: 1.0,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ContextRetriever for StaticRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _filters: &ContextFilters,
    ) -> Result<Vec<ContextSnippet>, ContextError> {
        Ok(self.snippets.clone())
    }
}

/// Records outgoing mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    fails: AtomicBool,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fails.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MailDelivery for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.fails.load(Ordering::SeqCst) {
            return Err(MailError::Status(503));
        }
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(mail.clone());
        Ok(())
    }
}
