use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

fn task_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z_-]*)?\d+$").expect("valid task id pattern")
    })
}

/// A task identifier is a letter prefix followed by digits (`TASK12`, `t-3`) or a bare number.
pub fn is_task_id(token: &str) -> bool {
    task_id_re().is_match(token)
}

/// Maps a dependency token onto the roster's spelling (case-insensitive);
/// tokens outside the roster are upper-cased.
pub fn resolve_token(token: &str, roster: &[String]) -> String {
    roster
        .iter()
        .find(|id| id.eq_ignore_ascii_case(token))
        .cloned()
        .unwrap_or_else(|| token.to_ascii_uppercase())
}

fn split_numeric(id: &str) -> (&str, Option<u64>) {
    let digits_at = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    match digits_at {
        Some(i) => (&id[..i], id[i..].parse().ok()),
        None => (id, None),
    }
}

/// Orders `TASK2` before `TASK10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (pa, na) = split_numeric(a);
    let (pb, nb) = split_numeric(b);
    pa.to_ascii_lowercase()
        .cmp(&pb.to_ascii_lowercase())
        .then_with(|| na.cmp(&nb))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_task_ids() {
        assert!(is_task_id("TASK1"));
        assert!(is_task_id("task-12"));
        assert!(is_task_id("42"));
        assert!(!is_task_id("none"));
        assert!(!is_task_id("TASK"));
        assert!(!is_task_id("TASK1a"));
        assert!(!is_task_id(""));
    }

    #[test]
    fn natural_order_sorts_numbers() {
        let mut ids = vec!["TASK10", "TASK2", "TASK1"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["TASK1", "TASK2", "TASK10"]);
    }

    #[test]
    fn resolves_roster_spelling() {
        let roster = vec!["Task1".to_string()];
        assert_eq!(resolve_token("TASK1", &roster), "Task1");
        assert_eq!(resolve_token("task9", &roster), "TASK9");
    }
}
