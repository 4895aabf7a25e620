use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::error::RecordError;

use super::types::ExecutionRecord;

/// Top-level keys every persisted record must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["status", "phases", "artifacts", "completion"];

/// Loads and saves one task's `execution.json`, validating both ways.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// `Ok(None)` means first run; a present but malformed record is an error.
    pub fn load(&self) -> Result<Option<ExecutionRecord>, RecordError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RecordError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Self::parse(&text).map(Some)
    }

    pub fn parse(text: &str) -> Result<ExecutionRecord, RecordError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RecordError::Parse(e.to_string()))?;
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;
        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(RecordError::MissingField(field));
            }
        }

        let record: ExecutionRecord =
            serde_json::from_value(value).map_err(|e| RecordError::Invalid(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Validates, stamps `updatedAt`, then writes via a temp file and rename.
    pub fn save(&self, record: &mut ExecutionRecord) -> Result<(), RecordError> {
        record.validate()?;
        record.updated_at = Some(Utc::now());

        let body = serde_json::to_string_pretty(record)
            .map_err(|e| RecordError::Invalid(e.to_string()))?;

        let io_err = |source| RecordError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PhaseStatus, RecordStatus};
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"{
        "status": "in_progress",
        "phases": [{"id": 1, "name": "Setup", "status": "completed"}],
        "artifacts": [{"path": "src/lib.rs", "kind": "created"}],
        "completion": {"status": "pending_validation"}
    }"#;

    #[test]
    fn parses_minimal_record() {
        let record = RecordStore::parse(MINIMAL).unwrap();
        assert_eq!(record.status, RecordStatus::InProgress);
        assert_eq!(record.phases[0].status, PhaseStatus::Completed);
        assert!(!record.artifacts[0].verified);
    }

    #[test]
    fn missing_required_field_is_hard_failure() {
        let text = r#"{"status": "pending", "phases": [], "artifacts": []}"#;
        assert!(matches!(
            RecordStore::parse(text),
            Err(RecordError::MissingField("completion"))
        ));
    }

    #[test]
    fn unknown_status_is_hard_failure() {
        let text = MINIMAL.replace("\"in_progress\"", "\"almost_done\"");
        assert!(matches!(
            RecordStore::parse(&text),
            Err(RecordError::Invalid(_))
        ));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            RecordStore::parse("[1, 2]"),
            Err(RecordError::NotAnObject)
        ));
    }

    #[test]
    fn absent_file_is_first_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path().join("execution.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_preserves_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path().join("TASK1").join("execution.json"));
        let mut record = RecordStore::parse(MINIMAL).unwrap();

        store.save(&mut record).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert!(loaded.updated_at.is_some());
        assert_eq!(loaded, record);
    }

    #[test]
    fn save_refuses_invalid_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path().join("execution.json"));
        let mut record = RecordStore::parse(MINIMAL).unwrap();
        record.phases[0].name = "  ".to_string();

        assert!(store.save(&mut record).is_err());
        assert!(!store.exists());
    }
}
