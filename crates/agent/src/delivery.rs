//! Outbound side effects: the calendar and the mail relay.
//!
//! Traits at the seam so the workers stay testable; the HTTP
//! implementations live behind them. The conflict verdict is computed
//! here from raw calendar data with pure functions, so the rules
//! (cancelled and transparent events never block, half-open overlap) are
//! unit-testable without a network.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use staffer_core::domain::pending::{CheckStatus, PendingEvent};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("calendar returned status {0}")]
    Status(u16),
    #[error("calendar is not configured")]
    NotConfigured,
    #[error("`{0}` does not exist in the configured timezone")]
    InvalidLocalTime(String),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay returned status {0}")]
    Status(u16),
    #[error("mail delivery is not configured")]
    NotConfigured,
}

/// A successfully created calendar event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookedEvent {
    pub event_id: String,
    pub event_link: Option<String>,
    pub meet_link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait CalendarDelivery: Send + Sync {
    async fn check_conflict(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CheckStatus, CalendarError>;

    async fn create_event(
        &self,
        event: &PendingEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BookedEvent, CalendarError>;
}

#[async_trait]
pub trait MailDelivery: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Resolves a local date/time/duration to a UTC window. A wall-clock time
/// skipped by a DST transition is an error, not a guess; an ambiguous one
/// takes the earlier instant.
pub fn event_window(
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: u32,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
    let local = date.and_time(time);
    let start = tz
        .from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| CalendarError::InvalidLocalTime(local.to_string()))?
        .with_timezone(&Utc);
    let end = start + chrono::Duration::minutes(i64::from(duration_minutes));
    Ok((start, end))
}

/// One event as reported by the calendar listing.
#[derive(Clone, Debug, Deserialize)]
pub struct ListedEvent {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transparency: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ListedEvent {
    fn blocks(&self) -> bool {
        if self.status.as_deref() == Some("cancelled") {
            return false;
        }
        // Transparent events are marked "free"; they never block.
        if self.transparency.as_deref() == Some("transparent") {
            return false;
        }
        true
    }
}

/// Whether any listed event genuinely occupies `[start, end)`. Back-to-back
/// events sharing a boundary do not overlap.
pub fn confirms_conflict(events: &[ListedEvent], start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    events.iter().any(|event| {
        let (Some(event_start), Some(event_end)) = (event.start, event.end) else {
            return false;
        };
        event.blocks() && event_start < end && event_end > start
    })
}

pub struct HttpCalendarDelivery {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    calendar_id: String,
    timezone: Tz,
}

impl HttpCalendarDelivery {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<SecretString>,
        calendar_id: String,
        timezone: Tz,
    ) -> Result<Self, CalendarError> {
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(CalendarError::NotConfigured)?
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http: reqwest::Client::new(), base_url, api_key, calendar_id, timezone })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn busy_per_freebusy(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, CalendarError> {
        let response = self
            .authorize(self.http.post(format!("{}/freeBusy", self.base_url)))
            .json(&json!({
                "timeMin": start.to_rfc3339(),
                "timeMax": end.to_rfc3339(),
                "items": [{"id": self.calendar_id}],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status(status.as_u16()));
        }

        #[derive(Deserialize)]
        struct FreeBusy {
            #[serde(default)]
            calendars: std::collections::HashMap<String, FreeBusyCalendar>,
        }
        #[derive(Default, Deserialize)]
        struct FreeBusyCalendar {
            #[serde(default)]
            busy: Vec<serde_json::Value>,
        }

        let parsed: FreeBusy = response.json().await?;
        Ok(parsed
            .calendars
            .get(&self.calendar_id)
            .is_some_and(|calendar| !calendar.busy.is_empty()))
    }

    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ListedEvent>, CalendarError> {
        let response = self
            .authorize(
                self.http
                    .get(format!("{}/calendars/{}/events", self.base_url, self.calendar_id))
                    .query(&[
                        ("timeMin", start.to_rfc3339()),
                        ("timeMax", end.to_rfc3339()),
                        ("singleEvents", "true".to_string()),
                    ]),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status(status.as_u16()));
        }

        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            items: Vec<ListedEvent>,
        }

        let listing: Listing = response.json().await?;
        Ok(listing.items)
    }
}

#[async_trait]
impl CalendarDelivery for HttpCalendarDelivery {
    async fn check_conflict(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CheckStatus, CalendarError> {
        // free/busy first; a busy verdict is only trusted once the event
        // listing confirms a real blocking event in the window. Stale
        // free/busy data otherwise blocks slots that are actually open.
        if !self.busy_per_freebusy(start, end).await? {
            return Ok(CheckStatus::Clear);
        }

        let events = self.list_events(start, end).await?;
        let confirmed = confirms_conflict(&events, start, end);
        debug!(
            event_name = "calendar.conflict_check",
            confirmed,
            listed = events.len(),
        );

        Ok(if confirmed { CheckStatus::Conflict } else { CheckStatus::Clear })
    }

    async fn create_event(
        &self,
        event: &PendingEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BookedEvent, CalendarError> {
        let attendees: Vec<serde_json::Value> = event
            .attendees
            .iter()
            .filter_map(|a| a.email.as_deref())
            .map(|email| json!({"email": email}))
            .collect();

        let response = self
            .authorize(
                self.http
                    .post(format!("{}/calendars/{}/events", self.base_url, self.calendar_id)),
            )
            .json(&json!({
                "summary": event.title,
                "location": event.location,
                "description": event.notes,
                "start": {"dateTime": start.to_rfc3339(), "timeZone": self.timezone.name()},
                "end": {"dateTime": end.to_rfc3339(), "timeZone": self.timezone.name()},
                "attendees": attendees,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status(status.as_u16()));
        }

        #[derive(Deserialize)]
        struct Created {
            id: String,
            #[serde(rename = "htmlLink")]
            html_link: Option<String>,
            #[serde(rename = "hangoutLink")]
            hangout_link: Option<String>,
        }

        let created: Created = response.json().await?;
        Ok(BookedEvent {
            event_id: created.id,
            event_link: created.html_link,
            meet_link: created.hangout_link,
        })
    }
}

/// Stand-in when no calendar is configured. Every operation fails with
/// `NotConfigured`, which the scheduler surfaces as a retryable error.
pub struct DisabledCalendar;

#[async_trait]
impl CalendarDelivery for DisabledCalendar {
    async fn check_conflict(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<CheckStatus, CalendarError> {
        Err(CalendarError::NotConfigured)
    }

    async fn create_event(
        &self,
        _event: &PendingEvent,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BookedEvent, CalendarError> {
        Err(CalendarError::NotConfigured)
    }
}

pub struct DisabledMail;

#[async_trait]
impl MailDelivery for DisabledMail {
    async fn send(&self, _mail: &OutgoingMail) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

pub struct HttpMailDelivery {
    http: reqwest::Client,
    relay_url: String,
    api_key: Option<SecretString>,
    from_address: String,
    from_name: String,
}

impl HttpMailDelivery {
    pub fn new(
        relay_url: Option<String>,
        api_key: Option<SecretString>,
        from_address: String,
        from_name: String,
    ) -> Result<Self, MailError> {
        let relay_url = relay_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(MailError::NotConfigured)?;

        Ok(Self { http: reqwest::Client::new(), relay_url, api_key, from_address, from_name })
    }
}

#[async_trait]
impl MailDelivery for HttpMailDelivery {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let mut request = self.http.post(&self.relay_url).json(&json!({
            "from": self.from_address,
            "from_name": self.from_name,
            "to": mail.to,
            "subject": mail.subject,
            "body": mail.body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(MailError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, h, m, 0).unwrap()
    }

    fn listed(start: DateTime<Utc>, end: DateTime<Utc>) -> ListedEvent {
        ListedEvent { status: Some("confirmed".to_string()), transparency: None, start: Some(start), end: Some(end) }
    }

    #[test]
    fn overlap_is_half_open() {
        let events = vec![listed(utc(14, 0), utc(15, 0))];
        // Back-to-back at the boundary: no conflict.
        assert!(!confirms_conflict(&events, utc(15, 0), utc(16, 0)));
        assert!(!confirms_conflict(&events, utc(13, 0), utc(14, 0)));
        // Any genuine overlap conflicts.
        assert!(confirms_conflict(&events, utc(14, 30), utc(15, 30)));
        assert!(confirms_conflict(&events, utc(13, 30), utc(14, 1)));
    }

    #[test]
    fn cancelled_and_transparent_events_never_block() {
        let mut cancelled = listed(utc(14, 0), utc(15, 0));
        cancelled.status = Some("cancelled".to_string());
        let mut transparent = listed(utc(14, 0), utc(15, 0));
        transparent.transparency = Some("transparent".to_string());

        assert!(!confirms_conflict(&[cancelled, transparent], utc(14, 0), utc(15, 0)));
    }

    #[test]
    fn events_without_times_are_ignored() {
        let event = ListedEvent {
            status: Some("confirmed".to_string()),
            transparency: None,
            start: None,
            end: None,
        };
        assert!(!confirms_conflict(&[event], utc(14, 0), utc(15, 0)));
    }

    #[test]
    fn event_window_converts_local_wall_clock_to_utc() {
        let (start, end) = event_window(
            NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            60,
            chrono_tz::America::New_York,
        )
        .expect("window");

        // 3pm Eastern in early March is UTC-5.
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 3, 20, 0, 0).unwrap());
        assert_eq!(end - start, chrono::Duration::minutes(60));
    }

    #[test]
    fn skipped_wall_clock_times_are_rejected() {
        // 2:30am on the spring-forward date does not exist in New York.
        let result = event_window(
            NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            30,
            chrono_tz::America::New_York,
        );
        assert!(matches!(result, Err(CalendarError::InvalidLocalTime(_))));
    }
}
