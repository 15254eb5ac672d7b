//! Rule-based entity extraction.
//!
//! Pure functions over a single utterance. Multi-turn accumulation is the
//! caller's job (`PendingEvent::merge_extracted` with the `overwrite`
//! flag); nothing here reads or writes state.

pub mod datetime;
pub mod email;
pub mod message;
pub mod names;
pub mod phrases;
pub mod title;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::pending::Attendee;

pub use message::{extract_message, MessageExtracted};
pub use phrases::{is_cancellation, is_confirmation};

/// Everything one utterance yielded for a scheduling action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extracted {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
    /// A date-shaped phrase was present but did not resolve to a real day.
    pub unresolved_date: bool,
    /// A time-shaped phrase was present but did not resolve to a real time.
    pub unresolved_time: bool,
}

/// Runs every scheduling rule against one utterance. `today` anchors
/// relative date phrases.
pub fn extract_event(text: &str, today: NaiveDate) -> Extracted {
    let date = datetime::parse_date(text, today);
    let unresolved_date = date.is_none() && datetime::mentions_date(text);
    let time = datetime::parse_time(text);
    let unresolved_time = time.is_none() && datetime::mentions_time(text);
    let duration_minutes = datetime::parse_duration_minutes(text);

    let attendees = collect_attendees(text);
    let known_names: Vec<String> =
        attendees.iter().filter_map(|a| a.name.clone()).collect();
    let title = title::infer_title(text, &known_names);

    Extracted {
        title,
        date,
        time,
        duration_minutes,
        location: None,
        attendees,
        unresolved_date,
        unresolved_time,
    }
}

/// Attendees from one utterance: explicit pairs first, then emails with a
/// preceding name clause, then bare emails, then bare names.
fn collect_attendees(text: &str) -> Vec<Attendee> {
    let mut attendees = names::extract_attendee_pairs(text);

    for found in email::extract_emails(text) {
        if attendees
            .iter()
            .any(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&found)))
        {
            continue;
        }
        let name = text
            .find(found.as_str())
            .and_then(|start| names::name_before_email(text, start));
        attendees.push(Attendee { name, email: Some(found) });
    }

    for name in names::extract_names(text) {
        let already_known = attendees.iter().any(|a| {
            a.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(&name))
        });
        if !already_known {
            attendees.push(Attendee::named(name));
        }
    }

    attendees
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn today() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn scheduling_utterance_extracts_all_fields() {
        let extracted =
            extract_event("Schedule a sync with Dana dana@x.com tomorrow at 3pm", today());

        assert_eq!(extracted.title.as_deref(), Some("sync"));
        assert_eq!(extracted.date, Some(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()));
        assert_eq!(extracted.time, Some(NaiveTime::from_hms_opt(15, 0, 0).unwrap()));
        assert_eq!(extracted.attendees, vec![Attendee::full("Dana", "dana@x.com")]);
        assert!(!extracted.unresolved_date);
    }

    #[test]
    fn bare_email_becomes_email_only_attendee() {
        let extracted = extract_event("add dana@x.com", today());
        assert_eq!(extracted.attendees, vec![Attendee::with_email("dana@x.com")]);
    }

    #[test]
    fn names_without_emails_become_name_only_attendees() {
        let extracted = extract_event("set up a standup with Dana and Lee on friday", today());
        assert_eq!(
            extracted.attendees,
            vec![Attendee::named("Dana"), Attendee::named("Lee")]
        );
        assert_eq!(extracted.date, Some(NaiveDate::from_ymd_opt(2026, 3, 6).unwrap()));
    }

    #[test]
    fn unresolved_date_is_flagged_not_guessed() {
        let extracted = extract_event("book the review for 31/2", today());
        assert_eq!(extracted.date, None);
        assert!(extracted.unresolved_date);
    }

    #[test]
    fn unresolved_time_is_flagged_not_guessed() {
        let extracted = extract_event("sync tomorrow at 3:75pm", today());
        assert_eq!(extracted.time, None);
        assert!(extracted.unresolved_time);
        assert!(!extracted.unresolved_date);
    }

    #[test]
    fn confirmation_turn_extracts_nothing() {
        let extracted = extract_event("book it", today());
        assert_eq!(extracted, Extracted::default());
    }
}
