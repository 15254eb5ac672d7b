//! Field extraction for outgoing messages (recipient, subject, body).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::email::extract_emails;
use crate::extract::names;

static SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsubject\s*:?\s*"?([^",\n]+)"?"#).unwrap());

static BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:body\s*:?|saying|that\s+says|telling\s+(?:him|her|them))\s*"?(.+?)"?\s*$"#)
        .unwrap()
});

static RECIPIENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?i)\b(?:email|message|write|mail)\s+(?:to\s+)?)([A-Z][A-Za-z'-]+(?:\s+[A-Z][A-Za-z'-]+)?)")
        .unwrap()
});

// The subject label is greedy to end of line; anything from a body-intro
// keyword onward belongs to the body, not the subject.
static BODY_INTRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:saying|that\s+says|body\s*:?)\b").unwrap());

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageExtracted {
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Extracts message fields from one utterance. Purely rule-based; the
/// messenger agent layers LLM drafting on top of this when the body is
/// missing.
pub fn extract_message(text: &str) -> MessageExtracted {
    let emails = extract_emails(text);
    let recipient_email = emails.first().cloned();

    let recipient_name = recipient_email
        .as_deref()
        .and_then(|email| text.find(email))
        .and_then(|start| names::name_before_email(text, start))
        .or_else(|| {
            RECIPIENT_NAME
                .captures(text)
                .map(|caps| caps[1].trim().to_string())
                .filter(|n| !names::NAME_BLOCKLIST.contains(&n.to_lowercase().as_str()))
        });

    let subject = SUBJECT
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .map(|s| match BODY_INTRO.find(&s) {
            Some(m) => s[..m.start()].trim().to_string(),
            None => s,
        })
        .filter(|s| !s.is_empty());

    let body = BODY
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|b| !b.is_empty());

    MessageExtracted { recipient_email, recipient_name, subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_compose_request() {
        let extracted = extract_message(
            "email Dana dana@x.com subject: Offsite logistics saying the venue moved to the annex",
        );
        assert_eq!(extracted.recipient_email.as_deref(), Some("dana@x.com"));
        assert_eq!(extracted.recipient_name.as_deref(), Some("Dana"));
        assert_eq!(extracted.subject.as_deref(), Some("Offsite logistics"));
        assert_eq!(extracted.body.as_deref(), Some("the venue moved to the annex"));
    }

    #[test]
    fn body_from_saying_clause() {
        let extracted = extract_message("send a message to lee@y.org saying see you at five");
        assert_eq!(extracted.recipient_email.as_deref(), Some("lee@y.org"));
        assert_eq!(extracted.body.as_deref(), Some("see you at five"));
    }

    #[test]
    fn recipient_name_without_email() {
        let extracted = extract_message("write to Dana about the delay");
        assert_eq!(extracted.recipient_email, None);
        assert_eq!(extracted.recipient_name.as_deref(), Some("Dana"));
    }

    #[test]
    fn nothing_recognized_is_all_none() {
        assert_eq!(extract_message("what a week"), MessageExtracted::default());
    }
}
