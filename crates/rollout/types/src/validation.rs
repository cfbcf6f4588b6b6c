//! Itemized validation results
//!
//! Every validation gate produces the same shape: a list of named checks,
//! each tagged with a severity. A result passes unless some check with
//! severity `Error` or `Critical` failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Whether a failed check at this severity fails the gate
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// A single named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ValidationCheck {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            severity: Severity::Info,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn fail(name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether this check blocks the gate
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity.is_blocking()
    }
}

impl fmt::Display for ValidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.name, self.message)
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            passed: true,
            checks: Vec::new(),
        }
    }

    /// Record a check and re-derive `passed`
    pub fn push(&mut self, check: ValidationCheck) {
        if check.is_blocking() {
            self.passed = false;
        }
        self.checks.push(check);
    }

    /// Record a pass/fail check in one call
    pub fn check(
        &mut self,
        name: &str,
        ok: bool,
        severity: Severity,
        message: impl Into<String>,
    ) {
        let message = message.into();
        if ok {
            self.push(ValidationCheck::pass(name, message));
        } else {
            self.push(ValidationCheck::fail(name, severity, message));
        }
    }

    /// Fold another result into this one, prefixing its check names
    pub fn merge(&mut self, prefix: &str, other: ValidationResult) {
        for mut check in other.checks {
            check.name = format!("{}.{}", prefix, check.name);
            self.push(check);
        }
    }

    /// Checks that failed the gate
    pub fn blocking_failures(&self) -> Vec<&ValidationCheck> {
        self.checks.iter().filter(|c| c.is_blocking()).collect()
    }

    /// Checks that did not pass, at any severity
    pub fn failures(&self) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Look up a check by name
    pub fn find(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// One-line summary of the blocking failures
    pub fn summary(&self) -> String {
        self.blocking_failures()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_does_not_fail_gate() {
        let mut result = ValidationResult::new();
        result.check("rollback.events", false, Severity::Warning, "no events");
        assert!(result.passed);
        assert_eq!(result.failures().count(), 1);
        assert!(result.blocking_failures().is_empty());
    }

    #[test]
    fn test_error_fails_gate() {
        let mut result = ValidationResult::new();
        result.check("name", true, Severity::Error, "ok");
        result.check("scaling.desired", false, Severity::Error, "out of range");
        assert!(!result.passed);
        assert_eq!(result.summary(), "[error] scaling.desired: out of range");
    }

    #[test]
    fn test_merge_prefixes_names() {
        let mut inner = ValidationResult::new();
        inner.check("runtime", false, Severity::Critical, "unsupported");

        let mut outer = ValidationResult::new();
        outer.merge("compatibility", inner);
        assert!(!outer.passed);
        assert!(outer.find("compatibility.runtime").is_some());
    }
}
