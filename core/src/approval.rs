//! Externally observable approval of a task.
//!
//! A task counts as approved once its planning document opens with the
//! completion declaration *and* its review document records the approval
//! marker in a `Status` section. Both checks are plain line/substring rules.

use crate::config::ApprovalConfig;
use crate::tasks::TaskLayout;

pub trait ApprovalProbe: Send + Sync {
    fn is_approved(&self, task_id: &str) -> bool;
}

pub struct MarkerApprovalProbe {
    layout: TaskLayout,
    declaration: String,
    marker: String,
    window: usize,
}

impl MarkerApprovalProbe {
    pub fn new(layout: TaskLayout, cfg: &ApprovalConfig) -> Self {
        Self {
            layout,
            declaration: cfg.declaration.trim().to_lowercase(),
            marker: cfg.marker.trim().to_uppercase(),
            window: cfg.window.max(1),
        }
    }

    pub fn declares_completion(&self, planning_text: &str) -> bool {
        planning_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.window)
            .any(|l| l.to_lowercase().contains(&self.declaration))
    }

    pub fn review_approved(&self, review_text: &str) -> bool {
        let negated = format!("NOT {}", self.marker);
        let mut in_status = false;
        for line in review_text.lines() {
            let trimmed = line.trim();
            if is_heading(trimmed) {
                in_status = trimmed.to_lowercase().contains("status");
                // `## Status: APPROVED` carries the marker on the heading itself.
                if !in_status {
                    continue;
                }
            }
            if in_status {
                let upper = trimmed.to_uppercase();
                if upper.contains(&self.marker) && !upper.contains(&negated) {
                    return true;
                }
            }
        }
        false
    }
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
}

impl ApprovalProbe for MarkerApprovalProbe {
    fn is_approved(&self, task_id: &str) -> bool {
        let Some(planning) = self.layout.planning_doc(task_id) else {
            return false;
        };
        let Ok(planning_text) = std::fs::read_to_string(planning) else {
            return false;
        };
        if !self.declares_completion(&planning_text) {
            return false;
        }
        std::fs::read_to_string(self.layout.review_doc(task_id))
            .map(|review| self.review_approved(&review))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(root: &std::path::Path) -> MarkerApprovalProbe {
        MarkerApprovalProbe::new(TaskLayout::new(root), &ApprovalConfig::default())
    }

    #[test]
    fn declaration_must_be_near_the_top() {
        let p = probe(std::path::Path::new("."));
        assert!(p.declares_completion("# TASK1\n\n**Status:** COMPLETED\n"));
        assert!(p.declares_completion("# TASK1\n**status:** completed"));
        assert!(!p.declares_completion("a\nb\nc\nd\ne\n**Status:** COMPLETED\n"));
        assert!(!p.declares_completion("# TASK1\n**Status:** IN PROGRESS\n"));
    }

    #[test]
    fn review_marker_in_status_section() {
        let p = probe(std::path::Path::new("."));
        assert!(p.review_approved("# Review\n\n## Status\n\nAPPROVED\n"));
        assert!(p.review_approved("## Status: APPROVED\n"));
        assert!(!p.review_approved("## Status\nNOT APPROVED\n"));
        assert!(!p.review_approved("## Notes\nAPPROVED\n## Status\npending\n"));
        assert!(!p.review_approved("APPROVED\n"));
    }

    #[test]
    fn probe_reads_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("TASK1");
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join("task.md"), "# TASK1\n**Status:** COMPLETED\n").unwrap();

        let p = probe(dir.path());
        assert!(!p.is_approved("TASK1"));

        std::fs::write(task_dir.join("review.md"), "## Status\nAPPROVED\n").unwrap();
        assert!(p.is_approved("TASK1"));
        assert!(!p.is_approved("TASK2"));
    }
}
