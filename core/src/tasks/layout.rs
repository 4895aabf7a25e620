use std::path::{Path, PathBuf};

use crate::error::GraphError;

use super::id::{is_task_id, natural_cmp};

pub const TASK_DOC: &str = "task.md";
pub const REVIEW_DOC: &str = "review.md";
pub const RECORD_FILE: &str = "execution.json";
pub const CHECKLIST_FILE: &str = "checklist.json";
pub const LEGACY_PLAN_DOC: &str = "plan.md";
pub const LEGACY_PROGRESS_DOC: &str = "progress.md";

/// Which planning format a task directory uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// `task.md` + `execution.json` with explicit phases.
    Structured,
    /// `plan.md` + `progress.md`, no phases.
    Legacy,
}

/// A located task definition, read once when the graph is built.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub id: String,
    pub mode: TaskMode,
    pub path: PathBuf,
    pub text: String,
}

/// Resolves per-task document paths under the tasks directory.
#[derive(Debug, Clone)]
pub struct TaskLayout {
    root: PathBuf,
}

impl TaskLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    pub fn task_doc(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(TASK_DOC)
    }

    pub fn review_doc(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(REVIEW_DOC)
    }

    pub fn record_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(RECORD_FILE)
    }

    pub fn checklist_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(CHECKLIST_FILE)
    }

    pub fn legacy_plan(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(LEGACY_PLAN_DOC)
    }

    pub fn legacy_progress(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(LEGACY_PROGRESS_DOC)
    }

    /// `Structured` wins when both formats are present.
    pub fn mode(&self, task_id: &str) -> Option<TaskMode> {
        if self.task_doc(task_id).is_file() {
            Some(TaskMode::Structured)
        } else if self.legacy_plan(task_id).is_file() {
            Some(TaskMode::Legacy)
        } else {
            None
        }
    }

    /// The planning document the dependency tag and approval declaration live in.
    pub fn planning_doc(&self, task_id: &str) -> Option<PathBuf> {
        match self.mode(task_id)? {
            TaskMode::Structured => Some(self.task_doc(task_id)),
            TaskMode::Legacy => Some(self.legacy_plan(task_id)),
        }
    }

    /// Task directories whose names are task identifiers, in natural order.
    pub fn discover(&self) -> std::io::Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_task_id(&name) {
                ids.push(name);
            }
        }
        ids.sort_by(|a, b| natural_cmp(a, b));
        Ok(ids)
    }

    /// Reads the definition of every rostered task.
    ///
    /// An explicit roster keeps its given order; otherwise the tasks directory is
    /// scanned. Any task without a locatable definition aborts the whole roster.
    pub fn roster(&self, explicit: &[String]) -> Result<Vec<TaskDefinition>, GraphError> {
        let ids = if explicit.is_empty() {
            self.discover()?
        } else {
            explicit.to_vec()
        };

        let mut defs = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(mode) = self.mode(&id) else {
                return Err(GraphError::MissingDefinition {
                    looked_in: self.task_dir(&id).display().to_string(),
                    task_id: id,
                });
            };
            let path = match mode {
                TaskMode::Structured => self.task_doc(&id),
                TaskMode::Legacy => self.legacy_plan(&id),
            };
            let text = std::fs::read_to_string(&path)?;
            defs.push(TaskDefinition {
                id,
                mode,
                path,
                text,
            });
        }
        Ok(defs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn discovers_task_dirs_in_natural_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "TASK10/task.md", "# ten");
        write(tmp.path(), "TASK2/task.md", "# two");
        write(tmp.path(), "notes/readme.md", "ignored");
        let layout = TaskLayout::new(tmp.path());

        assert_eq!(layout.discover().unwrap(), vec!["TASK2", "TASK10"]);
    }

    #[test]
    fn roster_detects_modes() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "TASK1/task.md", "# structured");
        write(tmp.path(), "TASK2/plan.md", "# legacy");
        write(tmp.path(), "TASK2/progress.md", "- [ ] step");
        let layout = TaskLayout::new(tmp.path());

        let defs = layout.roster(&[]).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].mode, TaskMode::Structured);
        assert_eq!(defs[1].mode, TaskMode::Legacy);
        assert_eq!(defs[1].text, "# legacy");
    }

    #[test]
    fn missing_definition_aborts_roster() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "TASK1/task.md", "# one");
        std::fs::create_dir_all(tmp.path().join("TASK2")).unwrap();
        let layout = TaskLayout::new(tmp.path());

        let err = layout.roster(&[]).unwrap_err();
        assert!(matches!(err, GraphError::MissingDefinition { ref task_id, .. } if task_id == "TASK2"));

        let err = layout
            .roster(&["TASK1".to_string(), "TASK7".to_string()])
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingDefinition { ref task_id, .. } if task_id == "TASK7"));
    }
}
