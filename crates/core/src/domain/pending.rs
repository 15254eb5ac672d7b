//! Persisted partial state for not-yet-executed side-effecting actions.
//!
//! One pending action per category per conversation. The cached
//! availability check is only meaningful while the date/time/duration it
//! was computed against are unchanged; any edit to those fields
//! invalidates it on the same turn.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::{Extracted, MessageExtracted};

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Clear,
    Conflict,
}

/// Cached result of a conflict check. Valid only while its inputs match
/// the pending fields exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub status: CheckStatus,
    pub checked_at: DateTime<Utc>,
}

impl AvailabilityCheck {
    pub fn matches(&self, date: NaiveDate, time: NaiveTime, duration_minutes: u32) -> bool {
        self.date == date && self.time == time && self.duration_minutes == duration_minutes
    }

    /// Fresh = identical inputs and younger than the TTL. A check taken in
    /// the future (clock skew) is treated as stale rather than trusted.
    pub fn is_fresh(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: u32,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> bool {
        if !self.matches(date, time, duration_minutes) {
            return false;
        }
        let age = now.signed_duration_since(self.checked_at);
        age >= chrono::Duration::zero() && age < chrono::Duration::seconds(ttl_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Attendee {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), email: None }
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self { name: None, email: Some(email.into()) }
    }

    pub fn full(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: Some(name.into()), email: Some(email.into()) }
    }

    fn email_key(&self) -> Option<String> {
        self.email.as_deref().map(|e| e.trim().to_ascii_lowercase()).filter(|e| !e.is_empty())
    }
}

/// Merges `incoming` attendees into `existing`.
///
/// Match order: email (case-insensitive) first; then an unambiguous
/// name-only/email-only reconciliation (exactly one of each side); else
/// append. Idempotent: merging the same input twice adds nothing new.
pub fn merge_attendees(existing: &mut Vec<Attendee>, incoming: &[Attendee]) {
    for candidate in incoming {
        let candidate_key = candidate.email_key();

        if let Some(key) = &candidate_key {
            if let Some(slot) = existing.iter_mut().find(|a| a.email_key().as_ref() == Some(key)) {
                if slot.name.is_none() {
                    slot.name = candidate.name.clone();
                }
                continue;
            }
        }

        // Name matched an existing entry: fill in a missing email, but two
        // distinct emails under one name are two people.
        if let Some(name) = candidate.name.as_deref() {
            let name_key = name.trim().to_ascii_lowercase();
            if let Some(slot) = existing.iter_mut().find(|a| {
                a.name.as_deref().map(|n| n.trim().to_ascii_lowercase()) == Some(name_key.clone())
            }) {
                let same_person = match (slot.email_key(), &candidate_key) {
                    (None, _) => {
                        slot.email = candidate.email.clone();
                        true
                    }
                    (Some(_), None) => true,
                    (Some(held), Some(incoming)) => held == *incoming,
                };
                if same_person {
                    continue;
                }
            }
        }

        // Email-only candidate against exactly one name-only entry (or the
        // mirror case) reconciles into a single attendee.
        if candidate_key.is_some() && candidate.name.is_none() {
            let mut name_only = existing.iter_mut().filter(|a| a.email.is_none() && a.name.is_some());
            if let (Some(slot), None) = (name_only.next(), name_only.next()) {
                slot.email = candidate.email.clone();
                continue;
            }
        }
        if candidate_key.is_none() && candidate.name.is_some() {
            let mut email_only = existing.iter_mut().filter(|a| a.name.is_none() && a.email.is_some());
            if let (Some(slot), None) = (email_only.next(), email_only.next()) {
                slot.name = candidate.name.clone();
                continue;
            }
        }

        if candidate.name.is_some() || candidate_key.is_some() {
            existing.push(candidate.clone());
        }
    }
}

/// Persisted under the `pending_event` metadata key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_check: Option<AvailabilityCheck>,
}

impl PendingEvent {
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    /// Merges one turn's extraction into the accumulated event.
    ///
    /// With `overwrite` set (the active turn) newly extracted values
    /// replace what is present; without it (history replay) extraction only
    /// fills gaps. Any resulting change to date, time, or duration drops
    /// the cached check.
    pub fn merge_extracted(&mut self, extracted: &Extracted, overwrite: bool) {
        let before = (self.date, self.time, self.duration_minutes());

        merge_field(&mut self.title, extracted.title.clone(), overwrite);
        merge_field(&mut self.date, extracted.date, overwrite);
        merge_field(&mut self.time, extracted.time, overwrite);
        merge_field(&mut self.duration_minutes, extracted.duration_minutes, overwrite);
        merge_field(&mut self.location, extracted.location.clone(), overwrite);

        merge_attendees(&mut self.attendees, &extracted.attendees);

        if (self.date, self.time, self.duration_minutes()) != before {
            self.invalidate_check();
        }
    }

    pub fn invalidate_check(&mut self) {
        self.availability_check = None;
    }

    pub fn record_check(&mut self, check: AvailabilityCheck) {
        self.availability_check = Some(check);
    }
}

/// Persisted under the `pending_message` metadata key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

impl PendingMessage {
    pub fn merge_extracted(&mut self, extracted: &MessageExtracted, overwrite: bool) {
        merge_field(&mut self.recipient_email, extracted.recipient_email.clone(), overwrite);
        merge_field(&mut self.recipient_name, extracted.recipient_name.clone(), overwrite);
        merge_field(&mut self.subject, extracted.subject.clone(), overwrite);
        merge_field(&mut self.body, extracted.body.clone(), overwrite);
    }
}

fn merge_field<T>(slot: &mut Option<T>, incoming: Option<T>, overwrite: bool) {
    if let Some(value) = incoming {
        if overwrite || slot.is_none() {
            *slot = Some(value);
        }
    }
}
