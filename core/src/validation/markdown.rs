//! Line-level helpers for loosely structured markdown.

/// Heading level (number of leading `#`), if the line is a heading.
pub fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    (level > 0 && trimmed[level..].starts_with([' ', '\t'])).then_some(level)
}

/// Body of the first heading whose text contains `title`, up to the next
/// heading of the same or higher level.
pub fn section_by_heading<'t>(text: &'t str, title: &str) -> Option<&'t str> {
    let title = title.to_lowercase();
    let mut offset = 0;
    let mut start: Option<(usize, usize)> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let Some(level) = heading_level(line) else {
            continue;
        };
        match start {
            None if line.to_lowercase().contains(&title) => start = Some((offset, level)),
            Some((body, open)) if level <= open => return Some(&text[body..line_start]),
            _ => {}
        }
    }
    start.map(|(body, _)| &text[body..])
}

/// Body after a non-heading label line (`**Title**`, `Title:`), up to the next heading.
pub fn section_by_label<'t>(text: &'t str, title: &str, bold: bool) -> Option<&'t str> {
    let title = title.to_lowercase();
    let mut offset = 0;
    let mut start: Option<usize> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim().to_lowercase();
        if let Some(body) = start {
            if heading_level(line).is_some() {
                return Some(&text[body..line_start]);
            }
            continue;
        }
        let stripped = trimmed.trim_start_matches(['-', '*', ' ']);
        let is_label = if bold {
            trimmed.contains(&format!("**{title}")) && trimmed.matches("**").count() >= 2
        } else {
            heading_level(line).is_none() && stripped.starts_with(&title) && trimmed.ends_with(':')
        };
        if is_label {
            start = Some(offset);
        }
    }
    start.map(|body| &text[body..])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits a table row on `|`, ignoring pipes inside backticks or escaped as `\|`.
pub fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_code = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '`' => {
                in_code = !in_code;
                cell.push(c);
            }
            '|' if !in_code => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn is_separator(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// All pipe tables in `text`, in document order.
pub fn tables(text: &str) -> Vec<Table> {
    let mut out = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();

    let mut flush = |block: &mut Vec<Vec<String>>| {
        if block.len() >= 2 {
            let mut rows = std::mem::take(block).into_iter();
            if let Some(header) = rows.next() {
                let rows: Vec<_> = rows.filter(|r| !is_separator(r)).collect();
                out.push(Table { header, rows });
            }
        }
        block.clear();
    };

    for line in text.lines() {
        if line.trim_start().starts_with('|') {
            block.push(split_row(line));
        } else {
            flush(&mut block);
        }
    }
    flush(&mut block);
    out
}

/// `- [ ]` / `- [x]` lines as `(checked, text)`.
pub fn checkboxes(text: &str) -> Vec<(bool, String)> {
    text.lines()
        .filter_map(|line| {
            let t = line.trim_start();
            let rest = t
                .strip_prefix("- [")
                .or_else(|| t.strip_prefix("* ["))
                .or_else(|| t.strip_prefix("+ ["))?;
            let mut chars = rest.chars();
            let mark = chars.next()?;
            let rest = chars.as_str().strip_prefix(']')?;
            let checked = match mark {
                'x' | 'X' => true,
                ' ' => false,
                _ => return None,
            };
            Some((checked, rest.trim().to_string()))
        })
        .collect()
}

/// Strips surrounding backticks from a table cell.
pub fn unquote_code(cell: &str) -> String {
    let t = cell.trim();
    let t = t.strip_prefix("```").and_then(|s| s.strip_suffix("```")).unwrap_or(t);
    let t = t.strip_prefix('`').and_then(|s| s.strip_suffix('`')).unwrap_or(t);
    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections() {
        let doc = "# Task\n## Strategy\nbody\n### Phase 1: X\nsub\n## Success Criteria\ncrit\n";
        assert_eq!(
            section_by_heading(doc, "strategy"),
            Some("body\n### Phase 1: X\nsub\n")
        );
        assert_eq!(section_by_heading(doc, "success criteria"), Some("crit\n"));
        assert_eq!(section_by_heading(doc, "missing"), None);

        let doc = "intro\n**Success Criteria**\n| a | b |\n\n## Next\n";
        assert_eq!(section_by_label(doc, "success criteria", true), Some("| a | b |\n\n"));
        let doc = "Success Criteria:\nline\n";
        assert_eq!(section_by_label(doc, "success criteria", false), Some("line\n"));
    }

    #[test]
    fn rows_keep_pipes_in_code() {
        assert_eq!(
            split_row("| Count | `grep -c x a | wc -l` | a \\| b |"),
            vec!["Count", "`grep -c x a | wc -l`", "a | b"]
        );
    }

    #[test]
    fn finds_tables() {
        let doc = "text\n| A | B |\n|---|:-:|\n| 1 | 2 |\n\n| C |\n|---|\n";
        let t = tables(doc);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].header, vec!["A", "B"]);
        assert_eq!(t[0].rows, vec![vec!["1".to_string(), "2".to_string()]]);
        assert!(t[1].rows.is_empty());
    }

    #[test]
    fn checkbox_lines() {
        let doc = "- [x] done\n- [ ] todo\n* [X] also\n- [?] odd\n- plain";
        assert_eq!(
            checkboxes(doc),
            vec![
                (true, "done".to_string()),
                (false, "todo".to_string()),
                (true, "also".to_string()),
            ]
        );
    }

    #[test]
    fn heading_levels() {
        assert_eq!(heading_level("### Phase 1"), Some(3));
        assert_eq!(heading_level("#hashtag"), None);
        assert_eq!(heading_level("text"), None);
    }
}
