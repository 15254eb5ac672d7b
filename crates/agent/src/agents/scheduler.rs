//! The scheduling worker.
//!
//! Accumulates event details across turns in the persisted pending slot,
//! asks for what is missing, checks the calendar before ever proposing a
//! booking, and books only on an explicit confirmation turn. The whole
//! turn runs under the conversation lock so concurrent requests cannot
//! interleave their read-modify-write cycles.

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};

use staffer_core::domain::pending::AvailabilityCheck;
use staffer_core::extract::extract_event;
use staffer_core::gatekeeper::{decide_event, format_missing_prompt, GateConfig, GateDecision};
use staffer_core::{
    AgentKind, AgentOutcome, ConversationState, OutcomePayload, PendingEvent, TurnIntent,
};
use staffer_db::{ConversationLocks, PendingStore};

use super::{Agent, AgentError};
use crate::delivery::{event_window, CalendarDelivery};

pub struct SchedulerAgent {
    store: PendingStore,
    locks: ConversationLocks,
    calendar: std::sync::Arc<dyn CalendarDelivery>,
    timezone: Tz,
    gate: GateConfig,
}

impl SchedulerAgent {
    pub fn new(
        store: PendingStore,
        locks: ConversationLocks,
        calendar: std::sync::Arc<dyn CalendarDelivery>,
        timezone: Tz,
        gate: GateConfig,
    ) -> Self {
        Self { store, locks, calendar, timezone, gate }
    }

    fn summarize(event: &PendingEvent) -> String {
        let title = event.title.as_deref().unwrap_or("(untitled)");
        let date = event
            .date
            .map(|d| d.format("%A, %B %-d, %Y").to_string())
            .unwrap_or_else(|| "(no date)".to_string());
        let time = event
            .time
            .map(|t| t.format("%-I:%M %p").to_string())
            .unwrap_or_else(|| "(no time)".to_string());

        let attendees: Vec<String> = event
            .attendees
            .iter()
            .map(|a| match (&a.name, &a.email) {
                (Some(name), Some(email)) => format!("{name} <{email}>"),
                (Some(name), None) => name.clone(),
                (None, Some(email)) => email.clone(),
                (None, None) => "(unknown)".to_string(),
            })
            .collect();

        let mut summary = format!(
            "\"{title}\" on {date} at {time} for {} minutes",
            event.duration_minutes()
        );
        if !attendees.is_empty() {
            summary.push_str(&format!(" with {}", attendees.join(", ")));
        }
        summary
    }
}

#[async_trait]
impl Agent for SchedulerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Scheduler
    }

    async fn run(
        &self,
        task: &str,
        state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let Some(conversation_id) = state.conversation_id.as_deref() else {
            return Ok(AgentOutcome::clarification(
                AgentKind::Scheduler,
                "I need a conversation to track event details across turns. \
                 Please retry with a conversation id.",
            ));
        };

        let lock = self.locks.lock_for(conversation_id).await;
        let _guard = lock.lock().await;

        let intent = TurnIntent::classify(task);
        if intent == TurnIntent::Cancellation {
            self.store.clear_event(conversation_id).await?;
            return Ok(AgentOutcome::success(
                AgentKind::Scheduler,
                "Okay, I've discarded the pending event. Nothing was booked.",
                OutcomePayload::Schedule {
                    action: "cancelled".to_string(),
                    event_id: None,
                    event_link: None,
                    meet_link: None,
                },
            ));
        }

        let mut event =
            self.store.load_event(conversation_id).await?.unwrap_or_default();

        let today = Utc::now().with_timezone(&self.timezone).date_naive();

        // History replay fills gaps only; the active turn overwrites.
        for turn in state.prior_user_turns() {
            event.merge_extracted(&extract_event(turn, today), false);
        }
        let active = extract_event(task, today);
        event.merge_extracted(&active, true);

        if active.unresolved_date && event.date.is_none() {
            self.store.save_event(conversation_id, &event).await?;
            return Ok(AgentOutcome::clarification(
                AgentKind::Scheduler,
                "I couldn't pin down that date. Which day did you mean \
                 (for example `tomorrow`, `next friday`, or `March 5`)?",
            ));
        }

        if active.unresolved_time && event.time.is_none() {
            self.store.save_event(conversation_id, &event).await?;
            return Ok(AgentOutcome::clarification(
                AgentKind::Scheduler,
                "I couldn't read that time. What time should it start \
                 (for example `3pm`, `15:30`, or `noon`)?",
            ));
        }

        let mut decision = decide_event(&event, intent, Utc::now(), &self.gate);

        if decision == GateDecision::CheckAvailability {
            // Completeness is guaranteed by the decision itself.
            let (Some(date), Some(time)) = (event.date, event.time) else {
                return Ok(AgentOutcome::clarification(
                    AgentKind::Scheduler,
                    format_missing_prompt(&staffer_core::gatekeeper::missing_event_fields(&event)),
                ));
            };

            let window = match event_window(date, time, event.duration_minutes(), self.timezone) {
                Ok(window) => window,
                Err(err) => {
                    self.store.save_event(conversation_id, &event).await?;
                    warn!(event_name = "scheduler.invalid_local_time", error = %err);
                    return Ok(AgentOutcome::clarification(
                        AgentKind::Scheduler,
                        "That wall-clock time doesn't exist on that date in your timezone \
                         (daylight saving). Could you pick a different time?",
                    ));
                }
            };

            let status = match self.calendar.check_conflict(window.0, window.1).await {
                Ok(status) => status,
                Err(err) => {
                    // The merged turn still counts; keep it for the retry.
                    self.store.save_event(conversation_id, &event).await?;
                    warn!(event_name = "scheduler.availability_check_failed", error = %err);
                    return Ok(AgentOutcome::error(
                        AgentKind::Scheduler,
                        "I couldn't reach the calendar to check that slot. Your event \
                         details are saved; ask me again in a moment.",
                    )
                    .with_note(err.to_string()));
                }
            };
            event.record_check(AvailabilityCheck {
                date,
                time,
                duration_minutes: event.duration_minutes(),
                status,
                checked_at: Utc::now(),
            });
            info!(event_name = "scheduler.availability_checked", status = ?status);

            decision = decide_event(&event, intent, Utc::now(), &self.gate);
        }

        match decision {
            GateDecision::AskMissing(missing) => {
                self.store.save_event(conversation_id, &event).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Scheduler,
                    format_missing_prompt(&missing),
                ))
            }
            GateDecision::AwaitConfirmation => {
                self.store.save_event(conversation_id, &event).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Scheduler,
                    format!(
                        "That slot is free. Here's what I have: {}. \
                         Reply `confirm` to book it or `cancel` to discard.",
                        Self::summarize(&event)
                    ),
                ))
            }
            GateDecision::Blocked => {
                self.store.save_event(conversation_id, &event).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Scheduler,
                    format!(
                        "{} conflicts with an existing event on your calendar. \
                         Pick another time or date and I'll check again.",
                        Self::summarize(&event)
                    ),
                ))
            }
            GateDecision::Send => {
                let (Some(date), Some(time)) = (event.date, event.time) else {
                    return Ok(AgentOutcome::clarification(
                        AgentKind::Scheduler,
                        format_missing_prompt(
                            &staffer_core::gatekeeper::missing_event_fields(&event),
                        ),
                    ));
                };
                let window =
                    event_window(date, time, event.duration_minutes(), self.timezone)?;

                match self.calendar.create_event(&event, window.0, window.1).await {
                    Ok(booked) => {
                        self.store.clear_event(conversation_id).await?;
                        info!(event_name = "scheduler.event_booked", event_id = %booked.event_id);
                        Ok(AgentOutcome::success(
                            AgentKind::Scheduler,
                            format!("Booked: {}.", Self::summarize(&event)),
                            OutcomePayload::Schedule {
                                action: "created".to_string(),
                                event_id: Some(booked.event_id),
                                event_link: booked.event_link,
                                meet_link: booked.meet_link,
                            },
                        ))
                    }
                    Err(err) => {
                        // Keep the slot so `confirm` can retry once the
                        // calendar is reachable again.
                        self.store.save_event(conversation_id, &event).await?;
                        warn!(event_name = "scheduler.booking_failed", error = %err);
                        Ok(AgentOutcome::error(
                            AgentKind::Scheduler,
                            "I couldn't reach the calendar to book that. Your event details \
                             are saved; reply `confirm` to try again.",
                        )
                        .with_note(err.to_string()))
                    }
                }
            }
            GateDecision::Cancel => {
                self.store.clear_event(conversation_id).await?;
                Ok(AgentOutcome::success(
                    AgentKind::Scheduler,
                    "Okay, I've discarded the pending event. Nothing was booked.",
                    OutcomePayload::Schedule {
                        action: "cancelled".to_string(),
                        event_id: None,
                        event_link: None,
                        meet_link: None,
                    },
                ))
            }
            GateDecision::CheckAvailability => {
                // Unreachable after the recheck above; fail safe by asking.
                self.store.save_event(conversation_id, &event).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Scheduler,
                    "Let me re-check that slot; please confirm once more.",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use staffer_core::domain::pending::CheckStatus;
    use staffer_core::{OutcomeStatus, TurnMessage};
    use staffer_db::repositories::InMemoryMetadataRepository;

    use super::*;
    use crate::testing::StaticCalendar;

    fn agent(calendar: Arc<StaticCalendar>) -> (SchedulerAgent, PendingStore) {
        let store = PendingStore::new(Arc::new(InMemoryMetadataRepository::default()));
        let agent = SchedulerAgent::new(
            store.clone(),
            ConversationLocks::new(),
            calendar,
            chrono_tz::UTC,
            GateConfig::default(),
        );
        (agent, store)
    }

    fn state(messages: Vec<TurnMessage>) -> ConversationState {
        ConversationState::new("", Some("conv-1".to_string()), messages, BTreeMap::new())
    }

    #[tokio::test]
    async fn missing_conversation_id_asks_for_one() {
        let (agent, _) = agent(Arc::new(StaticCalendar::clear()));
        let state = ConversationState::new("", None, Vec::new(), BTreeMap::new());

        let outcome = agent.run("schedule a sync tomorrow at 3pm", &state).await.expect("run");
        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
    }

    #[tokio::test]
    async fn partial_details_prompt_for_missing_fields_and_persist() {
        let (agent, store) = agent(Arc::new(StaticCalendar::clear()));

        let outcome = agent
            .run("schedule a sync with Dana tomorrow", &state(Vec::new()))
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("the time"));
        assert!(outcome.message.contains("an email address for Dana"));

        let pending = store.load_event("conv-1").await.expect("load").expect("saved");
        assert_eq!(pending.title.as_deref(), Some("sync"));
        assert!(pending.date.is_some());
    }

    #[tokio::test]
    async fn complete_details_with_clear_calendar_await_confirmation() {
        let (agent, store) = agent(Arc::new(StaticCalendar::clear()));

        let outcome = agent
            .run(
                "schedule a sync with Dana dana@x.com tomorrow at 3pm",
                &state(Vec::new()),
            )
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("Reply `confirm`"));

        let pending = store.load_event("conv-1").await.expect("load").expect("saved");
        assert_eq!(
            pending.availability_check.map(|c| c.status),
            Some(CheckStatus::Clear)
        );
    }

    #[tokio::test]
    async fn confirmation_books_and_clears_the_slot() {
        let calendar = Arc::new(StaticCalendar::clear());
        let (agent, store) = agent(calendar.clone());

        let history = vec![TurnMessage::user(
            "schedule a sync with Dana dana@x.com tomorrow at 3pm",
        )];

        // First pass stores the details and the fresh check.
        agent.run("schedule a sync with Dana dana@x.com tomorrow at 3pm", &state(Vec::new()))
            .await
            .expect("first turn");

        let outcome = agent.run("confirm", &state(history)).await.expect("confirm turn");

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(matches!(
            outcome.payload,
            OutcomePayload::Schedule { ref action, .. } if action == "created"
        ));
        assert_eq!(calendar.created_count(), 1);
        assert!(store.load_event("conv-1").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn conflict_blocks_booking_even_on_confirm() {
        let calendar = Arc::new(StaticCalendar::conflicted());
        let (agent, store) = agent(calendar.clone());

        agent
            .run("schedule a sync with Dana dana@x.com tomorrow at 3pm", &state(Vec::new()))
            .await
            .expect("seed");
        let outcome = agent
            .run(
                "confirm",
                &state(vec![TurnMessage::user(
                    "schedule a sync with Dana dana@x.com tomorrow at 3pm",
                )]),
            )
            .await
            .expect("confirm");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("conflicts"));
        assert_eq!(calendar.created_count(), 0);
        assert!(store.load_event("conv-1").await.expect("load").is_some());
    }

    #[tokio::test]
    async fn unparseable_time_asks_for_a_usable_one() {
        let (agent, store) = agent(Arc::new(StaticCalendar::clear()));

        let outcome = agent
            .run(
                "schedule a sync with Dana dana@x.com tomorrow at 3:75pm",
                &state(Vec::new()),
            )
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("couldn't read that time"));

        // The rest of the turn was still merged and kept.
        let pending = store.load_event("conv-1").await.expect("load").expect("saved");
        assert!(pending.date.is_some());
        assert!(pending.time.is_none());
    }

    #[tokio::test]
    async fn availability_check_failure_keeps_the_merged_turn() {
        let calendar = Arc::new(StaticCalendar::unreachable());
        let (agent, store) = agent(calendar.clone());

        let outcome = agent
            .run(
                "schedule a sync with Dana dana@x.com tomorrow at 3pm",
                &state(Vec::new()),
            )
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.message.contains("details are saved"));
        assert!(!outcome.notes.is_empty());
        assert_eq!(calendar.created_count(), 0);

        let pending = store.load_event("conv-1").await.expect("load").expect("saved");
        assert_eq!(pending.title.as_deref(), Some("sync"));
        assert!(pending.availability_check.is_none());
    }

    #[tokio::test]
    async fn cancellation_discards_the_pending_slot() {
        let (agent, store) = agent(Arc::new(StaticCalendar::clear()));

        agent
            .run("schedule a sync with Dana tomorrow", &state(Vec::new()))
            .await
            .expect("seed");
        assert!(store.load_event("conv-1").await.expect("load").is_some());

        let outcome = agent.run("cancel", &state(Vec::new())).await.expect("cancel");
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(store.load_event("conv-1").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn booking_failure_keeps_the_pending_slot() {
        let calendar = Arc::new(StaticCalendar::clear_but_booking_fails());
        let (agent, store) = agent(calendar);

        agent
            .run("schedule a sync with Dana dana@x.com tomorrow at 3pm", &state(Vec::new()))
            .await
            .expect("seed");
        let outcome = agent
            .run(
                "confirm",
                &state(vec![TurnMessage::user(
                    "schedule a sync with Dana dana@x.com tomorrow at 3pm",
                )]),
            )
            .await
            .expect("confirm");

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(store.load_event("conv-1").await.expect("load").is_some());
    }
}
