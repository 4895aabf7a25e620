//! Declared artifacts vs. the version-control working tree.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::record::{ExecutionRecord, RemediationCategory};
use crate::runner::{CommandRunner, CommandSpec};

use super::types::CheckReport;

const GIT_PREFIX: &str = "git rev-parse --show-prefix";
const GIT_STATUS: &str = "git status --porcelain --untracked-files=all -- .";

/// Both directions of mismatch. Deciding whether either is fatal is the caller's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// False when the project is not a repository (or git is unavailable).
    pub available: bool,
    pub undeclared: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.undeclared.is_empty() && self.unchanged.is_empty()
    }

    pub fn to_check(&self, strict: bool) -> CheckReport {
        let mut report = CheckReport::new("change-reconciliation");
        for path in &self.undeclared {
            let msg = format!("{path} changed but was not declared");
            if strict {
                report.fail(RemediationCategory::UndeclaredChanges, msg);
            } else {
                report.warn(RemediationCategory::UndeclaredChanges, msg);
            }
        }
        for path in &self.unchanged {
            let msg = format!("{path} declared but not changed");
            if strict {
                report.fail(RemediationCategory::UnchangedArtifacts, msg);
            } else {
                report.warn(RemediationCategory::UnchangedArtifacts, msg);
            }
        }
        report
    }
}

/// Paths from `git status --porcelain`; renames yield the new path.
pub fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|l| l.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit_once(" -> ").map(|(_, new)| new).unwrap_or(path);
            path.trim().trim_matches('"').to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Porcelain paths are relative to the repository root; re-anchors them on the
/// project directory (`prefix` as printed by `git rev-parse --show-prefix`).
pub fn rebase_paths(paths: Vec<String>, prefix: &str) -> Vec<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return paths;
    }
    paths
        .into_iter()
        .filter_map(|p| p.strip_prefix(prefix).map(str::to_string))
        .filter(|p| !p.is_empty())
        .collect()
}

fn covered(path: &str, changed: &[String]) -> bool {
    changed
        .iter()
        .any(|c| c == path || (c.ends_with('/') && path.starts_with(c.as_str())))
}

/// Compares pre-parsed changes against the record. Paths under `ignore` prefixes
/// (the tasks directory) are never reported as undeclared.
pub fn reconcile(record: &ExecutionRecord, changed: &[String], ignore: &[String]) -> ReconcileReport {
    let declared: BTreeSet<&str> = record.artifacts.iter().map(|a| a.path.as_str()).collect();

    let undeclared = changed
        .iter()
        .filter(|c| !declared.contains(c.as_str()))
        .filter(|c| !c.ends_with('/') || !declared.iter().any(|d| d.starts_with(c.as_str())))
        .filter(|c| !ignore.iter().any(|prefix| c.starts_with(prefix.as_str())))
        .cloned()
        .collect();

    let unchanged = record
        .artifacts
        .iter()
        .filter(|a| !covered(&a.path, changed))
        .map(|a| a.path.clone())
        .collect();

    ReconcileReport {
        available: true,
        undeclared,
        unchanged,
    }
}

pub struct Reconciler<'a> {
    pub runner: &'a dyn CommandRunner,
    pub root: &'a Path,
    pub timeout: Duration,
}

impl Reconciler<'_> {
    async fn git(&self, command: &str) -> Option<String> {
        let spec = CommandSpec {
            command: command.to_string(),
            cwd: self.root.to_path_buf(),
            timeout: self.timeout,
        };
        match self.runner.run(&spec).await {
            Ok(out) if out.success() => Some(out.stdout),
            Ok(out) => {
                tracing::debug!(command, stderr = %out.stderr.trim(), "git unavailable, skipping reconciliation");
                None
            }
            Err(e) => {
                tracing::debug!(command, error = %e, "git failed to run, skipping reconciliation");
                None
            }
        }
    }

    pub async fn run(&self, record: &ExecutionRecord, ignore: &[String]) -> ReconcileReport {
        let Some(prefix) = self.git(GIT_PREFIX).await else {
            return ReconcileReport::default();
        };
        let Some(status) = self.git(GIT_STATUS).await else {
            return ReconcileReport::default();
        };
        let changed = rebase_paths(parse_porcelain(&status), &prefix);
        reconcile(record, &changed, ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use crate::record::{Artifact, ArtifactKind};
    use crate::runner::CommandOutput;
    use pretty_assertions::assert_eq;

    fn record(paths: &[(&str, ArtifactKind)]) -> ExecutionRecord {
        let mut r = ExecutionRecord::seeded([(1, "Build".to_string())]);
        for (p, kind) in paths {
            r.artifacts.push(Artifact {
                path: p.to_string(),
                kind: *kind,
                verified: false,
                hallucination_detected: None,
            });
        }
        r
    }

    #[test]
    fn porcelain_paths() {
        let out = " M src/lib.rs\n?? src/new.rs\nR  old.rs -> renamed.rs\n?? \"with space.rs\"\n?? docs/\n";
        assert_eq!(
            parse_porcelain(out),
            vec!["src/lib.rs", "src/new.rs", "renamed.rs", "with space.rs", "docs/"]
        );
    }

    #[test]
    fn reports_both_directions() {
        let r = record(&[
            ("src/lib.rs", ArtifactKind::Modified),
            ("src/api.rs", ArtifactKind::Created),
            ("docs/guide.md", ArtifactKind::Created),
        ]);
        let changed: Vec<String> = ["src/lib.rs", "src/extra.rs", "docs/", "tasks/TASK1/execution.json"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let report = reconcile(&r, &changed, &["tasks/".to_string()]);
        assert!(report.available);
        assert_eq!(report.undeclared, vec!["src/extra.rs"]);
        assert_eq!(report.unchanged, vec!["src/api.rs"]);

        let check = report.to_check(false);
        assert!(check.passed());
        assert_eq!(check.warnings.len(), 2);
        assert_eq!(report.to_check(true).failures.len(), 2);
    }

    struct SubdirRepo;

    #[async_trait::async_trait]
    impl CommandRunner for SubdirRepo {
        fn name(&self) -> &str {
            "subdir-repo"
        }

        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
            let stdout = if spec.command.starts_with("git rev-parse") {
                "app/\n"
            } else {
                " M app/src/lib.rs\n?? app/src/new.rs\n?? app/tasks/TASK1/execution.json\n"
            };
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn rebasing_strips_the_project_prefix() {
        let paths = vec!["app/src/lib.rs".to_string(), "app/".to_string(), "other/x.rs".to_string()];
        assert_eq!(rebase_paths(paths.clone(), "app/\n"), vec!["src/lib.rs"]);
        assert_eq!(rebase_paths(paths.clone(), ""), paths);
    }

    #[tokio::test]
    async fn project_in_repo_subdirectory() {
        let r = record(&[("src/lib.rs", ArtifactKind::Modified)]);
        let reconciler = Reconciler {
            runner: &SubdirRepo,
            root: Path::new("/repo/app"),
            timeout: Duration::from_secs(5),
        };

        let report = reconciler.run(&r, &["tasks/".to_string()]).await;
        assert!(report.available);
        assert_eq!(report.undeclared, vec!["src/new.rs"]);
        assert!(report.unchanged.is_empty());
    }
}
