//! Date/time recognition rules.
//!
//! Ordered, named patterns; earlier rules win. All date math is relative
//! to a caller-supplied `today` so every rule is testable with literal
//! pairs.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
    .unwrap()
});

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").unwrap());

static NEXT_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .unwrap()
});

static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap());

static TWENTY_FOUR_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").unwrap());

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:for\s+)?(\d{1,3})\s*(?:-\s*)?(minutes?|mins?|hours?|hrs?)\b").unwrap()
});

/// Recognizes one calendar date in `text`, or nothing. Relative phrases
/// take precedence over absolute forms so "tomorrow 12/3" reads as
/// tomorrow.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.to_lowercase();

    if lowered.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }
    if lowered.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }
    if lowered.contains("today") {
        return Some(today);
    }

    if let Some(caps) = NEXT_WEEKDAY.captures(&lowered) {
        let weekday = weekday_from_name(&caps[2])?;
        return Some(upcoming_weekday(today, weekday));
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        let month = month_from_name(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year = caps
            .get(3)
            .and_then(|y| y.as_str().parse::<i32>().ok())
            .unwrap_or_else(|| today.year());
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = match caps.get(3) {
            Some(y) => {
                let raw: i32 = y.as_str().parse().ok()?;
                if raw < 100 { raw + 2000 } else { raw }
            }
            None => today.year(),
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// True when the text contains something date-shaped, even if it does not
/// resolve to a real calendar day (e.g. `31/2`). Lets callers distinguish
/// "no date given" from "date given but unparseable".
pub fn mentions_date(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("today")
        || lowered.contains("tomorrow")
        || NEXT_WEEKDAY.is_match(&lowered)
        || MONTH_DAY.is_match(text)
        || NUMERIC_DATE.is_match(text)
}

/// True when the text contains something time-shaped, even if it does not
/// resolve to a real wall-clock time (e.g. `3:75pm`). The counterpart of
/// `mentions_date` for the time slot.
pub fn mentions_time(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("noon")
        || lowered.contains("midnight")
        || CLOCK_TIME.is_match(&lowered)
        || TWENTY_FOUR_HOUR.is_match(text)
}

/// Recognizes one 24-hour wall-clock time in `text`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let lowered = text.to_lowercase();

    if lowered.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }
    if lowered.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }

    if let Some(caps) = CLOCK_TIME.captures(&lowered) {
        let mut hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        if hour > 12 {
            return None;
        }
        match &caps[3] {
            "pm" if hour != 12 => hour += 12,
            "am" if hour == 12 => hour = 0,
            _ => {}
        }
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    if let Some(caps) = TWENTY_FOUR_HOUR.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    None
}

/// Recognizes an explicit duration ("for 30 minutes", "2 hours").
pub fn parse_duration_minutes(text: &str) -> Option<u32> {
    let caps = DURATION.captures(text)?;
    let value: u32 = caps[1].parse().ok()?;
    if caps[2].to_lowercase().starts_with('h') {
        value.checked_mul(60)
    } else {
        Some(value)
    }
}

/// Removes every recognized date/time/duration span, for title inference.
pub fn strip_datetime(text: &str) -> String {
    let mut out = text.to_string();
    for re in [&*MONTH_DAY, &*NUMERIC_DATE, &*CLOCK_TIME, &*TWENTY_FOUR_HOUR, &*DURATION] {
        out = re.replace_all(&out, " ").into_owned();
    }
    static RELATIVE_WORDS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)\b(day after tomorrow|tomorrow|today|next\s+\w+day|monday|tuesday|wednesday|thursday|friday|saturday|sunday|noon|midnight|at|on)\b",
        )
        .unwrap()
    });
    RELATIVE_WORDS.replace_all(&out, " ").into_owned()
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let key: String = name.to_lowercase().chars().take(3).collect();
    match key.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

fn upcoming_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let today_num = today.weekday().num_days_from_monday() as i64;
    let target_num = target.num_days_from_monday() as i64;
    let mut ahead = (target_num - today_num).rem_euclid(7);
    // A bare weekday never means today; "next" on today's weekday means a
    // full week out.
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Monday.
    const fn anchor() -> (i32, u32, u32) {
        (2026, 3, 2)
    }

    fn today() -> NaiveDate {
        let (y, m, d) = anchor();
        day(y, m, d)
    }

    #[test]
    fn relative_dates() {
        assert_eq!(parse_date("let's meet today", today()), Some(day(2026, 3, 2)));
        assert_eq!(parse_date("tomorrow at 3pm", today()), Some(day(2026, 3, 3)));
        assert_eq!(parse_date("day after tomorrow", today()), Some(day(2026, 3, 4)));
    }

    #[test]
    fn weekday_references_advance_to_coming_occurrence() {
        // today() is a Monday
        assert_eq!(parse_date("on friday", today()), Some(day(2026, 3, 6)));
        assert_eq!(parse_date("next friday", today()), Some(day(2026, 3, 6)));
        // Same weekday as today always lands a week ahead.
        assert_eq!(parse_date("next monday", today()), Some(day(2026, 3, 9)));
        assert_eq!(parse_date("on monday", today()), Some(day(2026, 3, 9)));
    }

    #[test]
    fn month_name_dates() {
        assert_eq!(parse_date("March 5", today()), Some(day(2026, 3, 5)));
        assert_eq!(parse_date("on Jan 5th", today()), Some(day(2026, 1, 5)));
        assert_eq!(parse_date("December 31, 2027", today()), Some(day(2027, 12, 31)));
    }

    #[test]
    fn numeric_dates_are_day_month_order() {
        assert_eq!(parse_date("on 5/3", today()), Some(day(2026, 3, 5)));
        assert_eq!(parse_date("5/3/27", today()), Some(day(2027, 3, 5)));
        assert_eq!(parse_date("05/03/2027", today()), Some(day(2027, 3, 5)));
    }

    #[test]
    fn impossible_numeric_date_yields_nothing_but_is_still_a_mention() {
        assert_eq!(parse_date("31/2", today()), None);
        assert!(mentions_date("31/2"));
        assert!(!mentions_date("no schedule words here"));
    }

    #[test]
    fn time_shaped_but_impossible_yields_nothing_but_is_still_a_mention() {
        assert_eq!(parse_time("at 3:75pm"), None);
        assert!(mentions_time("at 3:75pm"));
        assert!(mentions_time("around noon"));
        assert!(!mentions_time("no clock words here"));
    }

    #[test]
    fn clock_times() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_time("at 3pm"), Some(t(15, 0)));
        assert_eq!(parse_time("3:30 PM"), Some(t(15, 30)));
        assert_eq!(parse_time("at 12am"), Some(t(0, 0)));
        assert_eq!(parse_time("12 pm sharp"), Some(t(12, 0)));
        assert_eq!(parse_time("09:45"), Some(t(9, 45)));
        assert_eq!(parse_time("at noon"), Some(t(12, 0)));
        assert_eq!(parse_time("by midnight"), Some(t(0, 0)));
        assert_eq!(parse_time("no time here"), None);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration_minutes("for 30 minutes"), Some(30));
        assert_eq!(parse_duration_minutes("45 min catchup"), Some(45));
        assert_eq!(parse_duration_minutes("for 2 hours"), Some(120));
        assert_eq!(parse_duration_minutes("quick chat"), None);
    }

    #[test]
    fn strip_datetime_removes_recognized_spans() {
        let stripped = strip_datetime("sync tomorrow at 3pm for 30 minutes");
        assert!(stripped.contains("sync"));
        assert!(!stripped.to_lowercase().contains("tomorrow"));
        assert!(!stripped.contains("3pm"));
        assert!(!stripped.contains("30"));
    }
}
