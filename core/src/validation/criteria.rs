//! Success-criteria tables: location, parsing and evaluation.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::machine::CommandDenylist;
use crate::record::{CriterionKind, CriterionResult, RemediationCategory};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::util::truncate_to;

use super::markdown::{section_by_heading, section_by_label, tables, unquote_code, Table};
use super::types::CheckReport;

const SECTION_TITLE: &str = "success criteria";
const EVIDENCE_LIMIT: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub criterion: String,
    pub command: Option<String>,
    pub kind: CriterionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Criterion,
    Command,
    Source,
    Tag,
    Manual,
    Other,
}

fn classify_header(cell: &str) -> Column {
    let h = cell.trim().trim_matches('*').to_lowercase();
    if h.contains("manual") {
        Column::Manual
    } else if h.contains("command") || h.contains("verify") || h.contains("automated check") {
        Column::Command
    } else if h.contains("criteri") || h.contains("requirement") {
        Column::Criterion
    } else if ["testable", "testability", "type", "kind", "mode"]
        .iter()
        .any(|k| h.contains(k))
    {
        Column::Tag
    } else if h.contains("source") {
        Column::Source
    } else {
        Column::Other
    }
}

fn column(header: &[Column], wanted: Column) -> Option<usize> {
    header.iter().position(|c| *c == wanted)
}

fn has_criterion_column(table: &Table) -> bool {
    table
        .header
        .iter()
        .any(|h| classify_header(h) == Column::Criterion)
}

/// The criteria table: under a `Success Criteria` heading, bold label or plain
/// label (in that order), else the first table with a criterion column.
pub fn locate_table(text: &str) -> Option<Table> {
    let sections = [
        section_by_heading(text, SECTION_TITLE),
        section_by_label(text, SECTION_TITLE, true),
        section_by_label(text, SECTION_TITLE, false),
    ];
    for section in sections.into_iter().flatten() {
        if let Some(table) = tables(section).into_iter().find(has_criterion_column) {
            return Some(table);
        }
    }
    tables(text).into_iter().find(has_criterion_column)
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    let cell = unquote_code(cell?);
    let blank = cell.is_empty() || matches!(cell.to_lowercase().as_str(), "-" | "—" | "n/a" | "none");
    (!blank).then_some(cell)
}

/// Criteria rows of the planning document. Two to five columns are accepted as
/// long as a criterion column is present.
pub fn parse_criteria(text: &str) -> Vec<Criterion> {
    let Some(table) = locate_table(text) else {
        return Vec::new();
    };
    let header: Vec<Column> = table.header.iter().map(|h| classify_header(h)).collect();
    let Some(crit_col) = column(&header, Column::Criterion) else {
        return Vec::new();
    };
    let cmd_col = column(&header, Column::Command);
    let tag_col = column(&header, Column::Tag);
    let manual_col = column(&header, Column::Manual);

    table
        .rows
        .iter()
        .filter_map(|row| {
            let criterion = non_empty(row.get(crit_col))?;
            let command = cmd_col.and_then(|c| non_empty(row.get(c)));
            let tag = tag_col
                .and_then(|c| row.get(c))
                .map(|t| t.trim().to_lowercase())
                .unwrap_or_default();
            let manual = manual_col.and_then(|c| non_empty(row.get(c))).is_some();

            let kind = if tag.starts_with("auto") {
                CriterionKind::Automatic
            } else if tag.starts_with("manual") {
                CriterionKind::Manual
            } else if tag.starts_with("both") {
                CriterionKind::Both
            } else if command.is_some() && manual {
                CriterionKind::Both
            } else if command.is_some() {
                CriterionKind::Automatic
            } else {
                CriterionKind::Manual
            };
            Some(Criterion {
                criterion,
                command,
                kind,
            })
        })
        .collect()
}

const PROSE_LEADS: &[&str] = &[
    "verify", "check", "ensure", "confirm", "manually", "manual", "review", "see", "inspect",
    "observe", "tbd", "todo", "n/a", "none", "should", "the", "all", "visual",
];

/// Whether a command cell looks like something a shell can run.
pub fn is_executable(command: &str) -> bool {
    let cmd = command.trim();
    let Some(first) = cmd.split_whitespace().next() else {
        return false;
    };
    if cmd.contains("...") || (cmd.contains('<') && cmd.contains('>') && !cmd.contains(" > ")) {
        return false;
    }
    if matches!(first, "[" | "[[") {
        return cmd.ends_with(']');
    }
    let starts_like_program = first
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '/' | '~' | '_'));
    let program_chars = first
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '~' | '+' | '='));
    starts_like_program && program_chars && !PROSE_LEADS.contains(&first.to_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    Search,
    Test,
    Build,
    Other,
}

pub fn classify_command(command: &str) -> CommandShape {
    let c = command.trim();
    let words: Vec<&str> = c.split_whitespace().collect();
    let first = words.first().copied().unwrap_or("");
    let second = words.get(1).copied().unwrap_or("");

    let test = matches!(
        (first, second),
        ("cargo", "test") | ("npm", "test") | ("go", "test") | ("make", "test") | ("yarn", "test") | ("pnpm", "test")
    ) || matches!(first, "pytest" | "jest" | "vitest")
        || c.contains("python -m pytest");
    if test {
        return CommandShape::Test;
    }
    if matches!((first, second), ("cargo", "build") | ("cargo", "check") | ("cargo", "clippy"))
        || matches!(first, "tsc" | "eslint")
    {
        return CommandShape::Build;
    }
    // `test`/`[` report through the exit code alone.
    if matches!(first, "grep" | "rg" | "ag" | "find" | "ls") {
        return CommandShape::Search;
    }
    CommandShape::Other
}

fn test_failure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)\b[1-9]\d* failed\b|\bFAILED\b|panicked at|^error(?:\[E\d+\])?:")
            .expect("valid test failure pattern")
    })
}

fn build_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*error\b").expect("valid build error pattern"))
}

/// Pass/fail of a criterion command from its output, by command shape.
pub fn evaluate(command: &str, output: &CommandOutput) -> bool {
    if !output.success() {
        return false;
    }
    match classify_command(command) {
        CommandShape::Search => {
            let out = output.stdout.trim();
            if out.is_empty() {
                return false;
            }
            let counts = command.contains(" -c") || command.contains("wc -l") || command.contains("--count");
            if counts {
                // Every reported count must be non-zero (`file:N` or bare `N`).
                let mut any = false;
                for line in out.lines() {
                    let n = line.rsplit(':').next().unwrap_or(line).trim();
                    if let Ok(n) = n.parse::<u64>() {
                        any = true;
                        if n == 0 {
                            return false;
                        }
                    }
                }
                any
            } else {
                true
            }
        }
        CommandShape::Test => !test_failure_re().is_match(&output.combined()),
        CommandShape::Build => !build_error_re().is_match(&output.combined()),
        CommandShape::Other => true,
    }
}

/// Criteria results plus the checker verdict.
#[derive(Debug, Clone)]
pub struct CriteriaOutcome {
    pub report: CheckReport,
    pub results: Vec<CriterionResult>,
}

pub struct CriteriaChecker<'a> {
    pub runner: &'a dyn CommandRunner,
    pub denylist: &'a CommandDenylist,
    pub cwd: &'a Path,
    pub timeout: Duration,
}

impl CriteriaChecker<'_> {
    /// Runs every automatic criterion of `planning_text`; manual rows are recorded unrun.
    pub async fn check(&self, planning_text: &str) -> CriteriaOutcome {
        let mut report = CheckReport::new("success-criteria");
        let mut results = Vec::new();

        for c in parse_criteria(planning_text) {
            let mut result = CriterionResult {
                criterion: c.criterion.clone(),
                command: c.command.clone(),
                kind: c.kind,
                passed: false,
                evidence: String::new(),
            };

            match (&c.command, c.kind.is_automatic()) {
                (_, false) => {
                    result.evidence = "manual verification required".to_string();
                }
                (None, true) => {
                    result.evidence = "no command given".to_string();
                    report.fail(
                        RemediationCategory::NonExecutableCriterion,
                        format!("criterion '{}' is automatic but has no command", c.criterion),
                    );
                }
                (Some(cmd), true) if !is_executable(cmd) => {
                    result.evidence = format!("not an executable command: {cmd}");
                    report.fail(
                        RemediationCategory::NonExecutableCriterion,
                        format!("criterion '{}' has a non-executable command: {cmd}", c.criterion),
                    );
                }
                (Some(cmd), true) => {
                    self.run_one(cmd, &mut result).await;
                    if !result.passed {
                        report.fail(
                            RemediationCategory::UnmetSuccessCriteria,
                            format!("criterion '{}' failed: {}", c.criterion, result.evidence),
                        );
                    }
                }
            }
            results.push(result);
        }

        CriteriaOutcome { report, results }
    }

    async fn run_one(&self, cmd: &str, result: &mut CriterionResult) {
        if let Err(denied) = self.denylist.check(cmd) {
            result.evidence = denied.to_string();
            return;
        }
        let spec = CommandSpec {
            command: cmd.to_string(),
            cwd: self.cwd.to_path_buf(),
            timeout: self.timeout,
        };
        match self.runner.run(&spec).await {
            Ok(out) if out.timed_out => {
                result.evidence = format!("timed out after {}s", self.timeout.as_secs());
            }
            Ok(out) => {
                result.passed = evaluate(cmd, &out);
                result.evidence = truncate_to(&out.combined(), EVIDENCE_LIMIT);
            }
            Err(e) => result.evidence = format!("failed to run: {e}"),
        }
        tracing::debug!(command = %cmd, passed = result.passed, "success criterion evaluated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(text: &str) -> Vec<(String, Option<String>)> {
        parse_criteria(text)
            .into_iter()
            .map(|c| (c.criterion, c.command))
            .collect()
    }

    fn output(code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn header_classification() {
        assert_eq!(classify_header("Manual Check"), Column::Manual);
        assert_eq!(classify_header("Verification Command"), Column::Command);
        assert_eq!(classify_header("**Criterion**"), Column::Criterion);
        assert_eq!(classify_header("Testability"), Column::Tag);
        assert_eq!(classify_header("Source"), Column::Source);
    }

    #[test]
    fn locates_table_by_section_then_header() {
        let doc = "| Name | Value |\n|---|---|\n| a | b |\n\n## Success Criteria\n| Criterion | Command |\n|---|---|\n| Builds | `cargo build` |\n";
        assert_eq!(pairs(doc), vec![("Builds".to_string(), Some("cargo build".to_string()))]);

        let doc = "Intro\n| Requirement | Verify |\n|---|---|\n| Lints | `cargo clippy` |\n";
        assert_eq!(pairs(doc), vec![("Lints".to_string(), Some("cargo clippy".to_string()))]);
    }

    #[test]
    fn two_to_five_columns_yield_same_pairs() {
        let two = "## Success Criteria\n| Criterion | Command |\n|---|---|\n| Builds | `cargo build` |\n| Router exists | `test -f src/router.rs` |\n";
        let three = "## Success Criteria\n| Criterion | Source | Command |\n|---|---|---|\n| Builds | plan | `cargo build` |\n| Router exists | 2.1 | `test -f src/router.rs` |\n";
        let four = "**Success Criteria**\n\n| Criterion | Source | Testable | Verification Command |\n|---|---|---|---|\n| Builds | plan | auto | `cargo build` |\n| Router exists | 2.1 | yes | `test -f src/router.rs` |\n";
        let five = "Success Criteria:\n| Criterion | Source | Type | Command | Manual Check |\n|:--|:--|:--|:--|:--|\n| Builds | plan | auto | `cargo build` | - |\n| Router exists | 2.1 | both | `test -f src/router.rs` | open it |\n";

        let expected = pairs(two);
        assert_eq!(expected.len(), 2);
        assert_eq!(pairs(three), expected);
        assert_eq!(pairs(four), expected);
        assert_eq!(pairs(five), expected);
    }

    #[test]
    fn kinds() {
        let doc = "## Success Criteria\n| Criterion | Type | Command | Manual Check |\n|---|---|---|---|\n| A | auto | `ls` | |\n| B | manual | | look |\n| C | both | `ls` | look |\n| D | | `ls` | look |\n| E | | | |\n";
        let kinds: Vec<_> = parse_criteria(doc).into_iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CriterionKind::Automatic,
                CriterionKind::Manual,
                CriterionKind::Both,
                CriterionKind::Both,
                CriterionKind::Manual,
            ]
        );
    }

    #[test]
    fn executable_heuristic() {
        assert!(is_executable("cargo test"));
        assert!(is_executable("./scripts/check.sh --fast"));
        assert!(is_executable("grep -rn foo src | wc -l"));
        assert!(!is_executable("Verify the page renders"));
        assert!(!is_executable("check that logs are clean"));
        assert!(!is_executable("run <your command>"));
        assert!(!is_executable("N/A"));
        assert!(is_executable("[ -d src/api ]"));
        assert!(!is_executable("[ see notes"));
    }

    #[test]
    fn command_shapes() {
        assert_eq!(classify_command("grep -c foo src/lib.rs"), CommandShape::Search);
        assert_eq!(classify_command("test -f Cargo.toml"), CommandShape::Other);
        assert_eq!(classify_command("[ -d src ]"), CommandShape::Other);
        assert_eq!(classify_command("cargo test -p core"), CommandShape::Test);
        assert_eq!(classify_command("pytest -q"), CommandShape::Test);
        assert_eq!(classify_command("cargo clippy"), CommandShape::Build);
        assert_eq!(classify_command("echo hi"), CommandShape::Other);
    }

    #[test]
    fn evaluation_heuristics() {
        assert!(evaluate("grep foo a.rs", &output(0, "foo()")));
        assert!(!evaluate("grep foo a.rs", &output(0, "")));
        assert!(!evaluate("grep -c foo a.rs", &output(0, "0")));
        assert!(evaluate("grep -c foo a.rs b.rs", &output(0, "a.rs:2\nb.rs:1")));
        assert!(!evaluate("grep -c foo a.rs b.rs", &output(0, "a.rs:2\nb.rs:0")));

        assert!(evaluate("cargo test", &output(0, "test result: ok. 4 passed; 0 failed")));
        assert!(!evaluate("cargo test", &output(0, "test result: FAILED. 3 passed; 1 failed")));
        assert!(!evaluate("npm test", &output(0, "thread 'x' panicked at src/lib.rs")));

        assert!(!evaluate("cargo build", &output(0, "error: could not compile")));
        assert!(evaluate("cargo build", &output(0, "Finished dev")));

        assert!(evaluate("echo ok", &output(0, "")));
        assert!(!evaluate("echo ok", &output(2, "")));
    }

    #[test]
    fn file_tests_pass_on_exit_code_without_output() {
        assert!(evaluate("test -f src/router.rs", &output(0, "")));
        assert!(!evaluate("test -f src/router.rs", &output(1, "")));
        assert!(evaluate("[ -d src/api ]", &output(0, "")));
    }
}
