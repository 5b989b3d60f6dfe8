//! Stage 5: privacy filter — PII/redaction rules applied
//! before any persistence; filtered spans are annotated with a reason.
//! A `blocked_category` match (content the policy forbids outright, not
//! merely redactable) is a hard `privacy_blocked` failure (
//! failure taxonomy): no retry, no partial persistence.

use std::sync::OnceLock;

use meridian_core::{ErrorKind, StepResult};
use regex::Regex;

use crate::types::RedactionSpan;

pub struct RedactionOutcome {
    pub text: String,
    pub spans: Vec<RedactionSpan>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").expect("email regex is valid"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").expect("phone regex is valid"))
}

fn ssn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn regex is valid"))
}

fn blocked_category_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(credit card number|social security card photo)\b").expect("blocked-category regex is valid")
    })
}

/// Applies the redaction rules, replacing each match with `[REDACTED:reason]`.
/// Returns `PrivacyBlocked` if `text` matches a forbidden category rather
/// than a merely-redactable one.
pub fn filter_text(text: &str) -> StepResult<RedactionOutcome> {
    if blocked_category_regex().is_match(text) {
        return StepResult::fail(ErrorKind::PrivacyBlocked, "content matches a blocked category");
    }

    let mut spans = Vec::new();
    let mut redacted = text.to_string();

    for (regex, reason) in [
        (email_regex(), "email"),
        (phone_regex(), "phone"),
        (ssn_regex(), "ssn"),
    ] {
        redacted = apply_redactions(&redacted, regex, reason, &mut spans);
    }

    StepResult::ok(RedactionOutcome { text: redacted, spans })
}

fn apply_redactions(text: &str, regex: &Regex, reason: &str, spans: &mut Vec<RedactionSpan>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for m in regex.find_iter(text) {
        out.push_str(&text[last_end..m.start()]);
        let replacement = format!("[REDACTED:{reason}]");
        spans.push(RedactionSpan { start: out.len(), end: out.len() + replacement.len(), reason: reason.to_string() });
        out.push_str(&replacement);
        last_end = m.end();
    }
    out.push_str(&text[last_end..]);
    out
}

/// Adapter so the same rules can be wired into
/// [`meridian_memory::store::MemoryStore::with_privacy_filter`] for any
/// caller that bypasses the ingestion pipeline's own stage 5 (e.g. a
/// manual memory-write API path).
pub struct RegexPrivacyFilter;

impl meridian_memory::store::PrivacyFilter for RegexPrivacyFilter {
    fn filter(&self, text: &str) -> (String, bool) {
        match filter_text(text) {
            StepResult::Ok { data, .. } => {
                let redacted = !data.spans.is_empty();
                (data.text, redacted)
            }
            _ => (text.to_string(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email_with_reason_span() {
        let outcome = filter_text("contact me at jane@example.com please").into_data().expect("ok");
        assert!(outcome.text.contains("[REDACTED:email]"));
        assert_eq!(outcome.spans[0].reason, "email");
    }

    #[test]
    fn redacts_phone_number() {
        let outcome = filter_text("call 555-123-4567 now").into_data().expect("ok");
        assert!(outcome.text.contains("[REDACTED:phone]"));
    }

    #[test]
    fn clean_text_has_no_spans() {
        let outcome = filter_text("nothing sensitive here").into_data().expect("ok");
        assert!(outcome.spans.is_empty());
    }

    #[test]
    fn blocked_category_hard_fails() {
        let result = filter_text("here is my credit card number: 4111 1111 1111 1111");
        assert!(result.is_fail());
        assert_eq!(result.error_kind(), Some(ErrorKind::PrivacyBlocked));
    }
}
