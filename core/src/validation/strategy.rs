//! Implementation-strategy outline: extraction, record seeding, and checking.

use std::sync::OnceLock;

use crate::record::{ExecutionRecord, PhaseItem, PhaseStatus, RemediationCategory};

use super::cascade::MatcherCascade;
use super::markdown::{checkboxes, section_by_heading};
use super::types::CheckReport;

const STRATEGY_SECTION: &str = "implementation strategy";
const FALLBACK_PHASE: &str = "Implementation";

fn phase_cascade() -> &'static MatcherCascade {
    static CASCADE: OnceLock<MatcherCascade> = OnceLock::new();
    CASCADE.get_or_init(|| {
        MatcherCascade::new(&[
            (
                "heading_phase",
                r"(?mi)^#{2,6}[ \t]*Phase[ \t]+(\d+)[ \t]*[:.\-–][ \t]*(.+?)[ \t]*$",
            ),
            (
                "bold_phase",
                r"(?mi)^[ \t]*(?:[-*][ \t]+)?\*\*Phase[ \t]+(\d+)[ \t]*[:.\-–][ \t]*(.+?)\*\*",
            ),
            (
                "plain_phase",
                r"(?mi)^[ \t]*Phase[ \t]+(\d+)[ \t]*[:.\-–][ \t]*(.+?)[ \t]*$",
            ),
            (
                "heading_step",
                r"(?mi)^#{2,6}[ \t]*Step[ \t]+(\d+)[ \t]*[:.\-–][ \t]*(.+?)[ \t]*$",
            ),
            ("numbered_bold", r"(?m)^[ \t]*(\d+)\.[ \t]+\*\*(.+?)\*\*"),
        ])
        .expect("valid strategy patterns")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlinePhase {
    pub number: u32,
    pub name: String,
    pub steps: Vec<String>,
}

fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_end_matches("**")
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn steps_in(body: &str) -> Vec<String> {
    let mut steps: Vec<String> = checkboxes(body).into_iter().map(|(_, s)| s).collect();
    if steps.is_empty() {
        steps = body
            .lines()
            .map(str::trim)
            .filter_map(|l| {
                let (num, rest) = l.split_once(' ')?;
                let (major, minor) = num.trim_end_matches('.').split_once('.')?;
                (major.parse::<u32>().is_ok() && minor.parse::<u32>().is_ok())
                    .then(|| rest.trim().to_string())
            })
            .collect();
    }
    steps
}

/// Declared phases of a planning document, most specific heading style first.
///
/// Looks inside the strategy section, then the whole document when the section
/// yields nothing (phases written as siblings of its heading).
pub fn outline(text: &str) -> Vec<OutlinePhase> {
    if let Some(section) = section_by_heading(text, STRATEGY_SECTION) {
        let scoped = outline_in(section);
        if !scoped.is_empty() {
            return scoped;
        }
    }
    outline_in(text)
}

fn outline_in(scope: &str) -> Vec<OutlinePhase> {
    let Some(found) = phase_cascade().first_match(scope) else {
        return Vec::new();
    };

    let spans: Vec<(usize, usize)> = found
        .captures
        .iter()
        .filter_map(|c| c.get(0))
        .map(|m| (m.start(), m.end()))
        .collect();

    found
        .captures
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let number = caps.get(1)?.as_str().parse().ok()?;
            let name = clean_name(caps.get(2)?.as_str());
            let body_start = spans.get(i)?.1;
            let body_end = spans.get(i + 1).map_or(scope.len(), |s| s.0);
            Some(OutlinePhase {
                number,
                name,
                steps: steps_in(&scope[body_start..body_end]),
            })
        })
        .collect()
}

/// First-run record: outline phases in order (renumbered when ids do not increase),
/// steps as pending items, or one `Implementation` phase when nothing is declared.
pub fn seed_record(text: &str) -> ExecutionRecord {
    let phases = outline(text);
    if phases.is_empty() {
        return ExecutionRecord::seeded([(1, FALLBACK_PHASE.to_string())]);
    }

    let increasing = phases.windows(2).all(|w| w[0].number < w[1].number) && phases[0].number > 0;
    let ids: Vec<u32> = if increasing {
        phases.iter().map(|p| p.number).collect()
    } else {
        (1..=phases.len() as u32).collect()
    };

    let mut record = ExecutionRecord::seeded(ids.iter().copied().zip(phases.iter().map(|p| p.name.clone())));
    for (phase, declared) in record.phases.iter_mut().zip(&phases) {
        phase.items = declared
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| PhaseItem {
                id: format!("{}.{}", phase.id, i + 1),
                description: step.clone(),
                status: PhaseStatus::Pending,
                evidence: None,
                flagged: false,
            })
            .collect();
    }
    record
}

/// Compares the declared outline against the record's phases.
///
/// A missing phase fails. More than half of a phase's items incomplete fails;
/// up to half only warns, since agents may consolidate steps.
pub fn check_strategy(planning_text: &str, record: &ExecutionRecord) -> CheckReport {
    let mut report = CheckReport::new("implementation-strategy");
    let declared = outline(planning_text);
    if declared.is_empty() {
        report.warn(
            RemediationCategory::MissingPhase,
            "no phase outline found in the planning document",
        );
        return report;
    }

    for phase in &declared {
        let recorded = record
            .phases
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&phase.name))
            .or_else(|| record.phase(phase.number));
        let Some(recorded) = recorded else {
            report.fail(
                RemediationCategory::MissingPhase,
                format!("phase {} '{}' is missing from the record", phase.number, phase.name),
            );
            continue;
        };

        let total = recorded.items.len();
        let incomplete = recorded
            .items
            .iter()
            .filter(|i| i.status != PhaseStatus::Completed)
            .count();
        if incomplete == 0 {
            continue;
        }
        let message = format!(
            "phase {} '{}' has {incomplete}/{total} incomplete items",
            recorded.id, recorded.name
        );
        if incomplete * 2 > total {
            report.fail(RemediationCategory::IncompleteItems, message);
        } else {
            report.warn(RemediationCategory::IncompleteItems, message);
        }
    }
    report
}
