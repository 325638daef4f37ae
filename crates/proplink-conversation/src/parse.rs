// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input parsing: phone canonicalization, email and OTP validation,
//! property-code extraction, and the small fixed keyword vocabularies the
//! handlers match against.

/// Canonicalize a sender phone number to international digits-only form.
///
/// A leading national trunk `0` is rewritten to the country code, a leading
/// `+` is stripped, and a short local form is prefixed with the country code.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{country_code}{rest}");
    }
    if digits.starts_with(country_code) {
        return digits;
    }
    format!("{country_code}{digits}")
}

/// Minimal email shape check: one `@`, a non-empty local part, and a dot in
/// the domain.
pub fn is_email(s: &str) -> bool {
    let s = s.trim();
    if s.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Exactly 6 ASCII digits.
pub fn is_otp_code(s: &str) -> bool {
    let s = s.trim();
    s.len() == 6 && s.chars().all(|c| c.is_ascii_digit())
}

/// Find a `PROP-` prefixed property code token in free text, upper-cased.
pub fn extract_property_code(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find(|token| {
            let upper = token.to_uppercase();
            upper.starts_with("PROP-")
                && upper.len() > 5
                && upper[5..].chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|token| token.to_uppercase())
}

/// The text with any property-code token removed, for use as a description.
pub fn strip_property_code(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for token in text.split_whitespace() {
        let trimmed = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
        if trimmed.to_uppercase().starts_with("PROP-") {
            continue;
        }
        out.push(token);
    }
    out.join(" ")
}

const REPORT_KEYWORDS: &[&str] = &[
    "leak", "burst", "broken", "break", "not working", "stopped working", "repair", "fix",
    "damage", "damaged", "water", "electric", "geyser", "toilet", "drain", "window", "door",
    "stove", "heater", "fault", "faulty", "issue", "problem", "mould", "mold", "pest",
];

/// Heuristic: does this free-text message read like an incident report?
pub fn looks_like_incident_report(text: &str) -> bool {
    if extract_property_code(text).is_some() {
        return true;
    }
    if text.trim().len() < 10 {
        return false;
    }
    let lower = text.to_lowercase();
    REPORT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

const AFFIRMATIVES: &[&str] = &["yes", "y", "yep", "confirm", "ok", "1"];
const NEGATIVES: &[&str] = &["no", "n", "nope", "cancel", "0"];
const RESOLUTION_KEYWORDS: &[&str] = &["resolved", "fixed", "done", "yes", "close", "closed"];
const UPDATE_KEYWORDS: &[&str] = &["update", "no", "not resolved", "still", "more"];
const SKIP_PHOTOS: &[&str] = &["skip", "no", "none", "done"];

fn normalized(text: &str) -> String {
    text.trim().trim_end_matches(['.', '!']).to_lowercase()
}

pub fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVES.contains(&normalized(text).as_str())
}

pub fn is_negative(text: &str) -> bool {
    NEGATIVES.contains(&normalized(text).as_str())
}

pub fn is_help(text: &str) -> bool {
    normalized(text) == "help"
}

pub fn is_cancel(text: &str) -> bool {
    normalized(text) == "cancel"
}

/// "This is sorted" vocabulary used to close an incident.
pub fn is_resolution(text: &str) -> bool {
    let t = normalized(text);
    RESOLUTION_KEYWORDS.iter().any(|kw| t == *kw)
}

/// "Keep it open, here is more" vocabulary. A keyword only counts when it is
/// the whole message or a leading word, so "nothing" does not match "no".
pub fn is_update(text: &str) -> bool {
    let t = normalized(text);
    UPDATE_KEYWORDS.iter().any(|kw| {
        t == *kw
            || t.strip_prefix(*kw)
                .is_some_and(|rest| rest.starts_with(|c: char| !c.is_alphanumeric()))
    })
}

pub fn is_skip_photos(text: &str) -> bool {
    SKIP_PHOTOS.contains(&normalized(text).as_str())
}

/// Explicit "this is a different problem" phrase inside an active incident.
pub fn is_new_issue_phrase(text: &str) -> bool {
    let t = normalized(text);
    t == "new issue" || t == "new problem" || t == "new" || t.starts_with("new issue")
}

/// Parse a 1-based numeric selection against a list of `count` options.
pub fn parse_selection(text: &str, count: usize) -> Option<usize> {
    let n: usize = text.trim().parse().ok()?;
    if n >= 1 && n <= count { Some(n - 1) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_forms_of_same_subscriber_normalize_identically() {
        let forms = ["0821234567", "+27821234567", "27821234567", "821234567"];
        for form in forms {
            assert_eq!(normalize_phone(form, "27"), "27821234567", "input {form}");
        }
    }

    #[test]
    fn phone_normalization_strips_punctuation() {
        assert_eq!(normalize_phone("082-123-4567", "27"), "27821234567");
        assert_eq!(normalize_phone("+27 82 123 4567", "27"), "27821234567");
    }

    #[test]
    fn otp_code_is_exactly_six_ascii_digits() {
        assert!(is_otp_code("123456"));
        assert!(is_otp_code(" 123456 "));
        assert!(!is_otp_code("12345"));
        assert!(!is_otp_code("1234567"));
        assert!(!is_otp_code("12345a"));
        assert!(!is_otp_code("12 456"));
    }

    #[test]
    fn email_requires_at_and_dotted_domain() {
        assert!(is_email("sam@example.com"));
        assert!(is_email("a.b@mail.co.za"));
        assert!(!is_email("sam-example.com"));
        assert!(!is_email("sam@localhost"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("sam@ example.com"));
    }

    #[test]
    fn property_code_extraction_finds_embedded_token() {
        assert_eq!(
            extract_property_code("PROP-ABC123 the tap is leaking"),
            Some("PROP-ABC123".to_string())
        );
        assert_eq!(
            extract_property_code("my code is prop-xy9, water everywhere"),
            Some("PROP-XY9".to_string())
        );
        assert_eq!(extract_property_code("no code here"), None);
        assert_eq!(extract_property_code("PROP-"), None);
    }

    #[test]
    fn strip_property_code_leaves_description() {
        assert_eq!(
            strip_property_code("PROP-ABC123 the tap is leaking in the kitchen"),
            "the tap is leaking in the kitchen"
        );
    }

    #[test]
    fn report_heuristic() {
        assert!(looks_like_incident_report("the geyser burst in the ceiling"));
        assert!(looks_like_incident_report("PROP-A1 hi"));
        assert!(!looks_like_incident_report("hi"));
        assert!(!looks_like_incident_report("good morning to you"));
    }

    #[test]
    fn yes_no_vocabularies_are_fixed() {
        for yes in ["yes", "Y", "yep", "confirm", "OK", "1", "yes."] {
            assert!(is_affirmative(yes), "{yes}");
        }
        for no in ["no", "N", "nope", "cancel", "0"] {
            assert!(is_negative(no), "{no}");
        }
        assert!(!is_affirmative("sure thing"));
        assert!(!is_negative("not really"));
    }

    #[test]
    fn resolution_and_update_keywords() {
        for word in ["resolved", "Fixed", "done", "close"] {
            assert!(is_resolution(word), "{word}");
        }
        for word in ["update", "no", "not resolved", "still leaking", "more info"] {
            assert!(is_update(word), "{word}");
        }
        assert!(!is_resolution("maybe"));
        assert!(!is_update("yes"));
        // Keywords must not match as bare prefixes of longer words.
        assert!(!is_update("nothing has changed"));
        assert!(!is_update("stillness"));
        assert!(!is_update("moreover it works now"));
    }

    #[test]
    fn numeric_selection_bounds() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection(" 3 ", 3), Some(2));
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("new", 3), None);
    }
}
