use crate::record::RemediationCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub category: RemediationCategory,
    pub message: String,
}

/// Verdict of one checker. Checkers never mutate the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub checker: &'static str,
    pub failures: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl CheckReport {
    pub fn new(checker: &'static str) -> Self {
        Self {
            checker,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn fail(&mut self, category: RemediationCategory, message: impl Into<String>) {
        self.failures.push(ValidationIssue {
            category,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, category: RemediationCategory, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            category,
            message: message.into(),
        });
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}
