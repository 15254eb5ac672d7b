use once_cell::sync::Lazy;
use regex::Regex;

pub static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%'+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// All RFC-shaped addresses in order of appearance; the first one is the
/// primary recipient unless labeled pairs say otherwise.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in EMAIL.find_iter(text) {
        let addr = m.as_str().to_string();
        if !seen.iter().any(|e: &String| e.eq_ignore_ascii_case(&addr)) {
            seen.push(addr);
        }
    }
    seen
}

pub fn strip_emails(text: &str) -> String {
    EMAIL.replace_all(text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_addresses_in_order() {
        let emails = extract_emails("cc dana@x.com and lee.o'brien+cal@corp.example.org please");
        assert_eq!(emails, vec!["dana@x.com", "lee.o'brien+cal@corp.example.org"]);
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let emails = extract_emails("dana@x.com or DANA@X.COM");
        assert_eq!(emails, vec!["dana@x.com"]);
    }

    #[test]
    fn ignores_text_without_addresses() {
        assert!(extract_emails("no at-signs here").is_empty());
    }
}
