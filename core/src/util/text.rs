/// Truncates `s` to at most `max` bytes on a char boundary, appending `…` when cut.
pub fn truncate_to(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let mut out = s[..end].to_string();
    out.push('…');
    out
}

/// Keeps the last `max` bytes of `s` on a char boundary, prefixing `…` when cut.
pub fn truncate_tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let start = s
        .char_indices()
        .map(|(i, _)| i)
        .find(|i| s.len() - i <= max)
        .unwrap_or(s.len());
    format!("…{}", &s[start..])
}

/// Single-line preview used in log fields and registry messages.
pub fn preview(s: &str) -> String {
    const MAX: usize = 160;
    let line = s.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    truncate_to(line, MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_to("hello", 10), "hello");
        assert_eq!(truncate_to("hello world", 5), "hello…");
        // 'é' is two bytes; cutting at 2 must not split it.
        assert_eq!(truncate_to("aé", 2), "a…");
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(truncate_tail("0123456789", 4), "…6789");
        assert_eq!(truncate_tail("short", 10), "short");
    }

    #[test]
    fn preview_uses_first_non_empty_line() {
        assert_eq!(preview("\n\n  first line \nsecond"), "first line");
    }
}
