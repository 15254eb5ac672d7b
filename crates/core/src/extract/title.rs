//! Event-title inference.
//!
//! An explicit `title:`/`subject:` label always wins. Failing that, the
//! utterance minus every recognized email, date/time span, attendee name,
//! and scheduling scaffolding word is the candidate, accepted only when it
//! is short, unlabeled free text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::{datetime, email, phrases};

static LABELED_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:title|subject)\s*:\s*"?([^",\n]+)"?"#).unwrap());

/// Verbs, articles, and connectives that frame a scheduling request but
/// never belong to the title itself.
const SCAFFOLDING: &[&str] = &[
    "schedule", "set", "setup", "book", "create", "add", "plan", "arrange", "organize",
    "up", "a", "an", "the", "please", "me", "my", "us", "let's", "lets", "can", "you",
    "with", "invite", "and", "for", "to", "about",
];

const MAX_TITLE_TOKENS: usize = 6;

pub fn labeled_title(text: &str) -> Option<String> {
    LABELED_TITLE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Infers a title from what remains of the utterance after every other
/// recognized entity is removed. `known_names` are attendee names already
/// extracted from the same utterance.
pub fn infer_title(text: &str, known_names: &[String]) -> Option<String> {
    if let Some(explicit) = labeled_title(text) {
        return Some(explicit);
    }

    if phrases::is_confirmation(text) || phrases::is_cancellation(text) {
        return None;
    }

    let mut residue = email::strip_emails(text);
    residue = datetime::strip_datetime(&residue);
    for name in known_names {
        for token in name.split_whitespace() {
            residue = remove_token(&residue, token);
        }
    }

    let tokens: Vec<&str> = residue
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';'))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| !SCAFFOLDING.contains(&t.to_lowercase().as_str()))
        .collect();

    if tokens.is_empty() || tokens.len() > MAX_TITLE_TOKENS {
        return None;
    }

    Some(tokens.join(" "))
}

fn remove_token(text: &str, token: &str) -> String {
    text.split_whitespace()
        .filter(|t| {
            let clean = t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-');
            !clean.eq_ignore_ascii_case(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_title_wins_over_inference() {
        assert_eq!(
            infer_title("schedule something, title: Quarterly Planning tomorrow", &[]),
            Some("Quarterly Planning tomorrow".to_string())
        );
        assert_eq!(
            infer_title("subject: Budget Review", &[]),
            Some("Budget Review".to_string())
        );
    }

    #[test]
    fn residue_after_stripping_becomes_the_title() {
        assert_eq!(
            infer_title(
                "Schedule a sync with Dana dana@x.com tomorrow at 3pm",
                &["Dana".to_string()],
            ),
            Some("sync".to_string())
        );
    }

    #[test]
    fn confirmations_and_long_residue_yield_nothing() {
        assert_eq!(infer_title("book it", &[]), None);
        assert_eq!(
            infer_title(
                "could we possibly find something that works for every single person involved",
                &[],
            ),
            None
        );
    }

    #[test]
    fn bare_residue_less_utterance_yields_nothing() {
        assert_eq!(infer_title("tomorrow at 3pm", &[]), None);
    }
}
