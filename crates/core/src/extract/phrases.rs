//! Fixed confirmation/cancellation phrase sets.
//!
//! Matching is exact over the trimmed, lowercased utterance with trailing
//! punctuation removed. These are deliberately small closed sets; "sounds
//! interesting" must not book a meeting.

const AFFIRMATIVE: &[&str] = &[
    "confirm",
    "confirmed",
    "yes",
    "y",
    "yes please",
    "go ahead",
    "book it",
    "do it",
    "send",
    "send it",
    "please send",
    "send now",
    "ok",
    "okay",
    "sounds good",
];

const NEGATIVE: &[&str] = &[
    "cancel",
    "cancel it",
    "no",
    "n",
    "stop",
    "don't send",
    "do not send",
    "never mind",
    "nevermind",
    "don't book it",
    "do not book it",
];

fn normalize(text: &str) -> String {
    text.trim().trim_end_matches(['.', '!', '?']).trim().to_lowercase()
}

pub fn is_confirmation(text: &str) -> bool {
    AFFIRMATIVE.contains(&normalize(text).as_str())
}

pub fn is_cancellation(text: &str) -> bool {
    NEGATIVE.contains(&normalize(text).as_str())
}
