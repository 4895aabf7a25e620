//! Dependency tag parsing.

use std::sync::OnceLock;

use crate::tasks::{is_task_id, resolve_token};
use crate::validation::MatcherCascade;

/// Explicit tag first; the bare word only counts when written as a label.
fn tag_cascade() -> &'static MatcherCascade {
    static CASCADE: OnceLock<MatcherCascade> = OnceLock::new();
    CASCADE.get_or_init(|| {
        MatcherCascade::new(&[
            (
                "at_tag",
                r"(?im)^[ \t]*(?:[-*+][ \t]+)?(?:\*\*|__)?@dependencies\b(?:\*\*|__)?[ \t]*[:=]?[ \t]*(.*)$",
            ),
            (
                "bold_label",
                r"(?im)^[ \t]*(?:[-*+][ \t]+)?(?:\*\*|__)[ \t]*(?:dependencies|depends[ \t]+on)[ \t]*[:=]?[ \t]*(?:\*\*|__)[ \t]*[:=]?[ \t]*(.*)$",
            ),
            (
                "colon_label",
                r"(?im)^[ \t]*(?:[-*+][ \t]+)?(?:dependencies|depends[ \t]+on)[ \t]*[:=][ \t]*(.*)$",
            ),
            (
                "bullet_label",
                r"(?im)^[ \t]*[-*+][ \t]+(?:dependencies|depends[ \t]+on)\b[ \t]*(.*)$",
            ),
        ])
        .expect("valid dependency tag patterns")
    })
}

const EMPTY_VALUES: &[&str] = &["", "none", "n/a", "-", "[]"];

/// Raw value of the first dependency tag line of the most explicit style present.
pub fn find_tag(text: &str) -> Option<&str> {
    let found = tag_cascade().first_match(text)?;
    found
        .captures
        .first()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Splits a tag value into candidate tokens, in declaration order, without duplicates.
pub fn split_value(value: &str) -> Vec<String> {
    let value = value.trim().trim_end_matches("**").trim();
    if EMPTY_VALUES.iter().any(|v| value.eq_ignore_ascii_case(v)) {
        return Vec::new();
    }

    let inner = value.trim_start_matches('[').trim_end_matches(']');
    let mut tokens: Vec<String> = Vec::new();
    for raw in inner.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = raw.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '[' | ']' | '.'));
        if token.is_empty() || token.eq_ignore_ascii_case("none") {
            continue;
        }
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Dependency set of `task_id` from its definition text. Non-identifier tokens and
/// self-references are dropped; tokens take the roster's spelling when they match it.
pub fn parse_dependencies(task_id: &str, text: &str, roster: &[String]) -> Vec<String> {
    let Some(value) = find_tag(text) else {
        return Vec::new();
    };

    split_value(value)
        .into_iter()
        .filter(|t| is_task_id(t))
        .map(|t| resolve_token(&t, roster))
        .filter(|t| !t.eq_ignore_ascii_case(task_id))
        .collect()
}
