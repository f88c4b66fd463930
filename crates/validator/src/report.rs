//! Validation result types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single finding, located by a JSON-path-like field reference
/// (e.g. `"peaks.evening.current"` or `"riders[2].contribution_pct"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

/// Outcome of validating one snapshot. Produced fresh per call and never
/// mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub checked_at: NaiveDateTime,
    /// Where the snapshot came from, for operator logs.
    pub source: String,
}

impl ValidationReport {
    pub(crate) fn new(source: &str, checked_at: NaiveDateTime) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            checked_at,
            source: source.to_string(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Drop repeated findings (stages overlap on a few checks when composed).
    pub(crate) fn dedup(&mut self) {
        dedup_issues(&mut self.errors);
        dedup_issues(&mut self.warnings);
    }

    /// One-line summary for skip-reason logging.
    pub fn summary(&self) -> String {
        if self.is_valid {
            format!("valid ({} warnings)", self.warnings.len())
        } else {
            let first = self
                .errors
                .first()
                .map(|e| format!("{}: {}", e.path, e.message))
                .unwrap_or_default();
            format!("{} errors, first: {first}", self.errors.len())
        }
    }
}

fn dedup_issues(issues: &mut Vec<ValidationIssue>) {
    let mut seen = std::collections::HashSet::new();
    issues.retain(|issue| seen.insert((issue.path.clone(), issue.message.clone())));
}
