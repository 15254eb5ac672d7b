//! The messaging worker.
//!
//! Same accumulate/confirm protocol as the scheduler, without the
//! calendar leg: recipient, subject, and body are collected across turns
//! under `pending_message`, and nothing leaves the building until the
//! user explicitly says send. The LLM may draft missing subject or body
//! text, but a draft only ever fills gaps; it never overwrites what the
//! user typed and never triggers a send.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use staffer_core::extract::extract_message;
use staffer_core::gatekeeper::{decide_message, format_missing_prompt, GateDecision};
use staffer_core::{
    AgentKind, AgentOutcome, ConversationState, OutcomePayload, PendingMessage, TurnIntent,
};
use staffer_db::{ConversationLocks, PendingStore};

use super::{Agent, AgentError};
use crate::delivery::{MailDelivery, OutgoingMail};
use crate::llm::{extract_json_slice, CompletionClient};

const DRAFT_SYSTEM_PROMPT: &str = "You draft short professional emails. Respond with JSON only: \
    {\"subject\": \"...\", \"body\": \"...\"}. No commentary.";

pub struct MessengerAgent {
    store: PendingStore,
    locks: ConversationLocks,
    mail: Arc<dyn MailDelivery>,
    llm: Arc<dyn CompletionClient>,
}

#[derive(Deserialize)]
struct Draft {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl MessengerAgent {
    pub fn new(
        store: PendingStore,
        locks: ConversationLocks,
        mail: Arc<dyn MailDelivery>,
        llm: Arc<dyn CompletionClient>,
    ) -> Self {
        Self { store, locks, mail, llm }
    }

    /// Fills missing subject/body from an LLM draft. Advisory only: a
    /// failed or malformed draft leaves the message as it was.
    async fn try_draft(&self, task: &str, message: &mut PendingMessage) {
        let user_prompt = format!(
            "Instruction: {task}\nRecipient: {}\nKnown subject: {}\nKnown body: {}",
            message.recipient_name.as_deref().unwrap_or("unknown"),
            message.subject.as_deref().unwrap_or("(none)"),
            message.body.as_deref().unwrap_or("(none)"),
        );

        let draft = match self.llm.complete(DRAFT_SYSTEM_PROMPT, &user_prompt).await {
            Ok(reply) => extract_json_slice(&reply)
                .and_then(|slice| serde_json::from_str::<Draft>(slice).ok()),
            Err(err) => {
                debug!(event_name = "messenger.draft_failed", error = %err);
                None
            }
        };

        if let Some(draft) = draft {
            if message.subject.is_none() {
                message.subject = draft.subject.filter(|s| !s.trim().is_empty());
            }
            if message.body.is_none() {
                message.body = draft.body.filter(|b| !b.trim().is_empty());
            }
        }
    }

    fn summarize(message: &PendingMessage) -> String {
        let to = match (&message.recipient_name, &message.recipient_email) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (None, Some(email)) => email.clone(),
            (Some(name), None) => name.clone(),
            (None, None) => "(no recipient)".to_string(),
        };
        format!(
            "To: {to}\nSubject: {}\n\n{}",
            message.subject.as_deref().unwrap_or("(none)"),
            message.body.as_deref().unwrap_or("(none)"),
        )
    }
}

#[async_trait]
impl Agent for MessengerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Messenger
    }

    async fn run(
        &self,
        task: &str,
        state: &ConversationState,
    ) -> Result<AgentOutcome, AgentError> {
        let Some(conversation_id) = state.conversation_id.as_deref() else {
            return Ok(AgentOutcome::clarification(
                AgentKind::Messenger,
                "I need a conversation to build up a message across turns. \
                 Please retry with a conversation id.",
            ));
        };

        let lock = self.locks.lock_for(conversation_id).await;
        let _guard = lock.lock().await;

        let intent = TurnIntent::classify(task);
        if intent == TurnIntent::Cancellation {
            self.store.clear_message(conversation_id).await?;
            return Ok(AgentOutcome::success(
                AgentKind::Messenger,
                "Okay, I've discarded the draft. Nothing was sent.",
                OutcomePayload::Message {
                    action: "cancelled".to_string(),
                    recipient: None,
                    subject: None,
                },
            ));
        }

        let mut message =
            self.store.load_message(conversation_id).await?.unwrap_or_default();

        for turn in state.prior_user_turns() {
            message.merge_extracted(&extract_message(turn), false);
        }
        message.merge_extracted(&extract_message(task), true);

        // Draft only on an informative turn; a bare `send` must not mint
        // content the user has never seen.
        if intent == TurnIntent::Statement
            && (message.subject.is_none() || message.body.is_none())
        {
            self.try_draft(task, &mut message).await;
        }

        match decide_message(&message, intent) {
            GateDecision::AskMissing(missing) => {
                self.store.save_message(conversation_id, &message).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Messenger,
                    format_missing_prompt(&missing),
                ))
            }
            GateDecision::AwaitConfirmation => {
                self.store.save_message(conversation_id, &message).await?;
                Ok(AgentOutcome::clarification(
                    AgentKind::Messenger,
                    format!(
                        "Here's the draft:\n\n{}\n\nReply `send` to send it or `cancel` to discard.",
                        Self::summarize(&message)
                    ),
                ))
            }
            GateDecision::Send => {
                let (Some(recipient), Some(subject), Some(body)) = (
                    message.recipient_email.clone(),
                    message.subject.clone(),
                    message.body.clone(),
                ) else {
                    // Completeness is guaranteed by the gate; ask again if not.
                    self.store.save_message(conversation_id, &message).await?;
                    return Ok(AgentOutcome::clarification(
                        AgentKind::Messenger,
                        format_missing_prompt(
                            &staffer_core::gatekeeper::missing_message_fields(&message),
                        ),
                    ));
                };

                let outgoing =
                    OutgoingMail { to: recipient.clone(), subject: subject.clone(), body };
                match self.mail.send(&outgoing).await {
                    Ok(()) => {
                        self.store.clear_message(conversation_id).await?;
                        info!(event_name = "messenger.mail_sent", recipient = %recipient);
                        Ok(AgentOutcome::success(
                            AgentKind::Messenger,
                            format!("Sent \"{subject}\" to {recipient}."),
                            OutcomePayload::Message {
                                action: "sent".to_string(),
                                recipient: Some(recipient),
                                subject: Some(subject),
                            },
                        ))
                    }
                    Err(err) => {
                        self.store.save_message(conversation_id, &message).await?;
                        warn!(event_name = "messenger.send_failed", error = %err);
                        Ok(AgentOutcome::error(
                            AgentKind::Messenger,
                            "I couldn't reach the mail relay. Your draft is saved; \
                             reply `send` to try again.",
                        ))
                    }
                }
            }
            GateDecision::Cancel => {
                self.store.clear_message(conversation_id).await?;
                Ok(AgentOutcome::success(
                    AgentKind::Messenger,
                    "Okay, I've discarded the draft. Nothing was sent.",
                    OutcomePayload::Message {
                        action: "cancelled".to_string(),
                        recipient: None,
                        subject: None,
                    },
                ))
            }
            // The message gate never asks for an availability check.
            GateDecision::CheckAvailability | GateDecision::Blocked => Ok(
                AgentOutcome::error(AgentKind::Messenger, "Unexpected gate decision."),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use staffer_core::{OutcomeStatus, TurnMessage};
    use staffer_db::repositories::InMemoryMetadataRepository;

    use super::*;
    use crate::testing::{RecordingMailer, ScriptedLlm};

    fn agent(
        mailer: Arc<RecordingMailer>,
        llm: Arc<ScriptedLlm>,
    ) -> (MessengerAgent, PendingStore) {
        let store = PendingStore::new(Arc::new(InMemoryMetadataRepository::default()));
        let agent =
            MessengerAgent::new(store.clone(), ConversationLocks::new(), mailer, llm);
        (agent, store)
    }

    fn state(messages: Vec<TurnMessage>) -> ConversationState {
        ConversationState::new("", Some("conv-1".to_string()), messages, BTreeMap::new())
    }

    #[tokio::test]
    async fn drafted_fields_fill_gaps_but_never_send() {
        let mailer = Arc::new(RecordingMailer::new());
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"subject": "Quarterly sync", "body": "Hi Dana, shall we sync this week?"}"#,
        ]));
        let (agent, store) = agent(mailer.clone(), llm);

        let outcome = agent
            .run("email dana@x.com about setting up a quarterly sync", &state(Vec::new()))
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("Reply `send`"));
        assert!(mailer.sent().is_empty());

        let draft = store.load_message("conv-1").await.expect("load").expect("saved");
        assert_eq!(draft.recipient_email.as_deref(), Some("dana@x.com"));
        assert_eq!(draft.subject.as_deref(), Some("Quarterly sync"));
        assert!(draft.body.is_some());
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_asking_for_fields() {
        let mailer = Arc::new(RecordingMailer::new());
        let (agent, _) = agent(mailer, Arc::new(ScriptedLlm::failing()));

        let outcome = agent
            .run("email dana@x.com", &state(Vec::new()))
            .await
            .expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(outcome.message.contains("a subject line"));
        assert!(outcome.message.contains("the message body"));
    }

    #[tokio::test]
    async fn send_confirmation_delivers_and_clears() {
        let mailer = Arc::new(RecordingMailer::new());
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"subject": "Sync", "body": "Hi Dana"}"#,
        ]));
        let (agent, store) = agent(mailer.clone(), llm);

        agent
            .run("email dana@x.com about the sync", &state(Vec::new()))
            .await
            .expect("seed");
        let outcome = agent
            .run(
                "send it",
                &state(vec![TurnMessage::user("email dana@x.com about the sync")]),
            )
            .await
            .expect("send");

        assert_eq!(outcome.status, OutcomeStatus::Success);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "dana@x.com");
        assert!(store.load_message("conv-1").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn bare_send_never_mints_content() {
        let mailer = Arc::new(RecordingMailer::new());
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"subject": "Invented", "body": "Invented"}"#,
        ]));
        let (agent, _) = agent(mailer.clone(), llm);

        let outcome = agent.run("send", &state(Vec::new())).await.expect("run");

        assert_eq!(outcome.status, OutcomeStatus::NeedsClarification);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn relay_failure_keeps_the_draft() {
        let mailer = Arc::new(RecordingMailer::failing());
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"subject": "Sync", "body": "Hi Dana"}"#,
        ]));
        let (agent, store) = agent(mailer, llm);

        agent
            .run("email dana@x.com about the sync", &state(Vec::new()))
            .await
            .expect("seed");
        let outcome = agent
            .run(
                "send it",
                &state(vec![TurnMessage::user("email dana@x.com about the sync")]),
            )
            .await
            .expect("send");

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(store.load_message("conv-1").await.expect("load").is_some());
    }

    #[tokio::test]
    async fn cancellation_discards_the_draft() {
        let mailer = Arc::new(RecordingMailer::new());
        let llm = Arc::new(ScriptedLlm::with_replies([
            r#"{"subject": "Sync", "body": "Hi Dana"}"#,
        ]));
        let (agent, store) = agent(mailer.clone(), llm);

        agent
            .run("email dana@x.com about the sync", &state(Vec::new()))
            .await
            .expect("seed");
        let outcome = agent.run("don't send", &state(Vec::new())).await.expect("cancel");

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(mailer.sent().is_empty());
        assert!(store.load_message("conv-1").await.expect("load").is_none());
    }
}
