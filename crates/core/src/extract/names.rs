//! Person-name and attendee recognition.
//!
//! Rules run in a fixed precedence order and every candidate passes the
//! same filters: at most four tokens, no scheduling nouns, no collective
//! nouns in list contexts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::pending::Attendee;
use crate::extract::email::EMAIL;
use crate::extract::phrases;

/// Scheduling/domain nouns that are never a person's name.
pub const NAME_BLOCKLIST: &[&str] = &[
    "meeting", "meet", "standup", "sync", "call", "appointment", "event", "schedule",
    "reminder", "lunch", "dinner", "breakfast", "review", "interview", "demo", "catchup",
    "check-in", "checkin", "session", "workshop", "presentation", "email", "message",
    "invite", "task", "todo", "project", "report", "calendar", "subject", "title", "body",
];

/// Generic groups; a list like "the team and parents" names nobody.
const COLLECTIVE_NOUNS: &[&str] = &[
    "team", "everyone", "everybody", "all", "parents", "family", "staff", "group",
    "folks", "people", "guys", "colleagues", "clients",
];

/// Connectives that attach a name to the rest of the sentence but are not
/// part of it.
const LEADING_STOPWORDS: &[&str] =
    &["with", "invite", "for", "to", "and", "add", "cc", "also", "please", "at"];

static EXPLICIT_NAME: Lazy<Regex> = Lazy::new(|| {
    // Capture up to eight tokens so the four-token limit is enforced by the
    // shared filter instead of silently truncated by the pattern.
    Regex::new(r"(?:(?i)\b(?:attendee\s+)?name\s+is\s+)([A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*){0,7})")
        .unwrap()
});

static TITLED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b((?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][A-Za-z'-]+(?:\s+[A-Z][A-Za-z'-]+)?)\b")
        .unwrap()
});

static ANGLE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*){0,3})\s*<\s*([A-Za-z0-9._%'+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})\s*>").unwrap()
});

static PAREN_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*){0,3})\s*\(\s*([A-Za-z0-9._%'+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})\s*\)").unwrap()
});

static COLON_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*){0,3})\s*:\s*([A-Za-z0-9._%'+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})").unwrap()
});

static NAME_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:with|invite|attendees?:?)\s+([A-Za-z'&, -]+)").unwrap()
});

static STANDALONE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z'-]*(?:\s+[A-Z][A-Za-z'-]*){0,3}$").unwrap());

fn is_blocklisted(token: &str) -> bool {
    NAME_BLOCKLIST.contains(&token.trim().to_lowercase().as_str())
}

fn is_collective(token: &str) -> bool {
    let key = token.trim().trim_start_matches("the ").to_lowercase();
    COLLECTIVE_NOUNS.contains(&key.as_str())
}

fn acceptable_name(candidate: &str) -> bool {
    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    !tokens.is_empty() && tokens.len() <= 4 && !tokens.iter().any(|t| is_blocklisted(t))
}

/// The short capitalized clause directly before `email_start`, trimmed of
/// leading connectives. Walks backwards over capitalized tokens, stopping
/// at scheduling nouns and connectives.
pub fn name_before_email(text: &str, email_start: usize) -> Option<String> {
    let prefix = text[..email_start]
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '<' | '(' | ':' | ','));

    let mut run: Vec<&str> = Vec::new();
    for token in prefix.split_whitespace().rev() {
        let clean = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
        if clean.is_empty()
            || run.len() == 4
            || !clean.chars().next().is_some_and(|c| c.is_uppercase())
            || is_blocklisted(clean)
            || LEADING_STOPWORDS.contains(&clean.to_lowercase().as_str())
        {
            break;
        }
        run.push(clean);
    }

    if run.is_empty() {
        return None;
    }
    run.reverse();
    Some(run.join(" "))
}

/// Ordered name extraction over one utterance. Earlier rules win; later
/// rules only add names not already present.
pub fn extract_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for caps in EXPLICIT_NAME.captures_iter(text) {
        push_name(&mut names, caps[1].to_string());
    }
    for caps in TITLED_NAME.captures_iter(text) {
        push_name(&mut names, caps[1].to_string());
    }
    for m in EMAIL.find_iter(text) {
        if let Some(name) = name_before_email(text, m.start()) {
            push_name(&mut names, name);
        }
    }
    for name in list_names(text) {
        push_name(&mut names, name);
    }

    // A bare short capitalized reply ("Dana Hall") is a name as long as it
    // is not itself a confirmation and carries no digits or address.
    let trimmed = text.trim();
    if names.is_empty()
        && STANDALONE_NAME.is_match(trimmed)
        && !trimmed.chars().any(|c| c.is_ascii_digit())
        && !EMAIL.is_match(trimmed)
        && !phrases::is_confirmation(trimmed)
        && !phrases::is_cancellation(trimmed)
    {
        push_name(&mut names, trimmed.to_string());
    }

    names
}

fn push_name(names: &mut Vec<String>, candidate: String) {
    if acceptable_name(&candidate) && !names.iter().any(|n| n.eq_ignore_ascii_case(&candidate)) {
        names.push(candidate);
    }
}

/// Names introduced by "with"/"invite"/"attendees", comma- or
/// "and"-separated. Candidates must be fully capitalized and individual
/// (no collective nouns).
fn list_names(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in NAME_LIST.captures_iter(text) {
        for piece in caps[1].split([',', '&']).flat_map(|p| p.split(" and ")) {
            let candidate = piece.trim().trim_start_matches("the ").trim();
            if candidate.is_empty() || is_collective(candidate) {
                continue;
            }
            // Keep the leading capitalized run; trailing lowercase words
            // ("Lee on friday") belong to the rest of the sentence.
            let run: Vec<&str> = candidate
                .split_whitespace()
                .take_while(|t| t.chars().next().is_some_and(|c| c.is_uppercase()))
                .collect();
            if run.is_empty() {
                continue;
            }
            let name = run.join(" ");
            if acceptable_name(&name) && !is_collective(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// Explicit `Name <email>` / `Name (email)` / `Name: email` pairs.
pub fn extract_attendee_pairs(text: &str) -> Vec<Attendee> {
    let mut pairs = Vec::new();
    for re in [&*ANGLE_PAIR, &*PAREN_PAIR, &*COLON_PAIR] {
        for caps in re.captures_iter(text) {
            let name = caps[1].trim().to_string();
            let email = caps[2].trim().to_string();
            if !acceptable_name(&name) {
                continue;
            }
            if !pairs.iter().any(|a: &Attendee| {
                a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&email))
            }) {
                pairs.push(Attendee::full(name, email));
            }
        }
    }
    pairs
}
