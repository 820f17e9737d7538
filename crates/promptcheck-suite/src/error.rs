//! Validation errors aggregated across the whole load phase.

use std::fmt;
use std::path::PathBuf;

/// One defect found while loading test definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub file: PathBuf,
    /// Index of the offending test case within its file, when applicable.
    pub case_index: Option<usize>,
    /// The missing or invalid field, when applicable.
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(idx) = self.case_index {
            write!(f, " (test #{idx})")?;
        }
        if let Some(field) = &self.field {
            write!(f, " field '{field}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All validation defects found in one load pass.
///
/// The loader deliberately keeps scanning after the first defect so a CI
/// run reports every problem at once.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub issues: Vec<ValidationIssue>,
}

impl LoadError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} validation error(s):", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadError {}
