//! Diagnostic records and the error types of the validation module.
use crate::model::SourceLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How serious a diagnostic is.
///
/// Callers that only care about validity can filter on `Error`; `Warning`
/// covers the advisory tiers, and `InternalError` marks a rule that could not
/// finish (its absence of findings says nothing about the model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    InternalError,
}

/// The family a rule belongs to; each family can be switched on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Identifier,
    Math,
    Units,
    /// Unit checks whose findings are advice rather than proof of an error.
    UnitAdvisory,
    Sbo,
    Overdetermined,
    ModelingPractice,
}

/// One finding of one rule against one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: u32,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    /// The kind of object the finding is about, e.g. `Compartment`.
    pub entity_kind: String,
    pub entity_id: Option<String>,
    pub location: Option<SourceLocation>,
}

/// The ordered result of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticLog {
    diagnostics: Vec<Diagnostic>,
    /// Set when the configured cap dropped diagnostics from the end.
    truncated: bool,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Keeps the first `limit` diagnostics.
    pub fn truncate(&mut self, limit: usize) {
        if self.diagnostics.len() > limit {
            self.diagnostics.truncate(limit);
            self.truncated = true;
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn with_rule(&self, rule_id: u32) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.rule_id == rule_id)
    }

    pub fn count(&self, rule_id: u32) -> usize {
        self.with_rule(rule_id).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl IntoIterator for DiagnosticLog {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Why a rule body could not complete. Converted into an
/// `InternalError` diagnostic at the dispatch boundary.
#[derive(Error, Debug)]
pub enum RuleFault {
    #[error("Rule was dispatched to an unexpected {0} target")]
    UnexpectedTarget(&'static str),

    #[error("Required attribute '{attribute}' is missing on {kind}")]
    MissingAttribute { kind: &'static str, attribute: &'static str },

    #[error("Internal inconsistency: {0}")]
    Inconsistent(String),
}

/// Raised when a rule id is registered twice.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Rule {0} is already registered")]
    DuplicateRule(u32),
}
