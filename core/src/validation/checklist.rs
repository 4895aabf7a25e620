//! Per-artifact review checklist, in either of its two schema shapes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ChecklistError;
use crate::machine::normalize_path;
use crate::record::{ArtifactKind, ExecutionRecord, RemediationCategory};

use super::types::CheckReport;

pub const MIN_JUSTIFICATION: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub path: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewedFile {
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewChecklist {
    V2 {
        version: u32,
        entries: Vec<ChecklistEntry>,
    },
    V1 {
        reviewed: BTreeMap<String, ReviewedFile>,
    },
}

impl ReviewChecklist {
    /// `Ok(None)` when no checklist has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, ChecklistError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ChecklistError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map(Some)
    }

    pub fn parse(text: &str) -> Result<Self, ChecklistError> {
        serde_json::from_str(text).map_err(|e| ChecklistError::Schema(e.to_string()))
    }
}

fn file_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s:]+:\d+(?:-\d+)?$").expect("valid file:line pattern"))
}

/// Structural problems of one v2 entry.
pub fn entry_problems(entry: &ChecklistEntry) -> Vec<String> {
    let mut problems = Vec::new();
    let justification = entry.justification.trim();
    if justification.chars().count() < MIN_JUSTIFICATION {
        problems.push(format!(
            "justification is {} chars, needs at least {MIN_JUSTIFICATION}",
            justification.chars().count()
        ));
    }
    let mut has_line_ref = false;
    for reference in &entry.references {
        let reference = reference.trim();
        if reference.contains(['`', '{', '}', ';']) {
            problems.push(format!("reference holds inline code: {reference}"));
        } else if file_line_re().is_match(reference) {
            has_line_ref = true;
        }
    }
    if !has_line_ref {
        problems.push("no file:line reference".to_string());
    }
    problems
}

/// Every non-deleted artifact must be reviewed in the checklist.
pub fn check_checklist(
    checklist: Option<&ReviewChecklist>,
    record: &ExecutionRecord,
    root: &Path,
) -> CheckReport {
    let mut report = CheckReport::new("review-checklist");
    let required: Vec<&str> = record
        .artifacts
        .iter()
        .filter(|a| a.kind != ArtifactKind::Deleted)
        .map(|a| a.path.as_str())
        .collect();
    if required.is_empty() {
        return report;
    }

    let Some(checklist) = checklist else {
        report.fail(
            RemediationCategory::UnmetChecklistItems,
            format!("no review checklist for {} declared artifact(s)", required.len()),
        );
        return report;
    };

    match checklist {
        ReviewChecklist::V2 { entries, .. } => {
            for path in required {
                let entry = entries
                    .iter()
                    .find(|e| normalize_path(&e.path, root) == path);
                match entry {
                    None => report.fail(
                        RemediationCategory::UnmetChecklistItems,
                        format!("{path}: no checklist entry"),
                    ),
                    Some(entry) => {
                        for problem in entry_problems(entry) {
                            report.fail(
                                RemediationCategory::UnmetChecklistItems,
                                format!("{path}: {problem}"),
                            );
                        }
                    }
                }
            }
        }
        ReviewChecklist::V1 { reviewed } => {
            for path in required {
                let entry = reviewed
                    .iter()
                    .find(|(p, _)| normalize_path(p, root) == path)
                    .map(|(_, r)| r);
                match entry {
                    Some(r) if r.checked => {}
                    Some(_) => report.fail(
                        RemediationCategory::UnmetChecklistItems,
                        format!("{path}: not checked"),
                    ),
                    None => report.fail(
                        RemediationCategory::UnmetChecklistItems,
                        format!("{path}: no checklist entry"),
                    ),
                }
            }
        }
    }
    report
}
