//! Diagnostics infrastructure for reporting non-fatal issues during input
//! validation.
//!
//! Malformed input (bad stage ordering, non-positive area, ...) is a hard
//! [`crate::error::CoreError::Input`]. This module is for the softer case:
//! things worth flagging to a caller without aborting construction, e.g. a
//! crop with no stage requirements at all, or an interaction rule that
//! references a crop family no input crop uses. [`Diagnostics`] collects
//! these so a validation pass can report everything it found in one shot
//! instead of stopping at the first issue.
//!
//! # Example
//!
//! ```
//! use crop_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("interaction_rule", "rule references unused crop family 'Brassica'");
//! assert_eq!(diag.warning_count(), 1);
//! ```

use serde::Serialize;

/// Severity level for a diagnostic issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but planning can continue (e.g. an unused interaction rule).
    Warning,
    /// The affected entity will be skipped rather than aborting the whole run.
    Error,
}

/// A single diagnostic issue encountered during validation.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping, e.g. "field", "crop", "interaction_rule".
    pub category: String,
    pub message: String,
    /// Optional entity reference, e.g. a field or crop id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues gathered during a validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues.push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues.push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Warning).count()
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();
        match (warnings, errors) {
            (0, 0) => "no issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}
