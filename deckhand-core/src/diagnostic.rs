//! Diagnostics accumulated while parsing and validating a deck.
//!
//! Diagnostics never abort traversal. They are appended as they are found
//! and handed back next to a best-effort result; the caller decides which
//! severity is fatal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Line-level syntax error reported by the parser.
    Syntax,
    UnknownSection,
    UnknownParameter,
    TypeMismatch,
    DomainViolation,
    MissingRequired,
    ConditionallyIrrelevant,
    DuplicateSection,
    DuplicateParameter,
    UniquenessViolation,
    MissingSection,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::UnknownSection => "unknown-section",
            DiagnosticKind::UnknownParameter => "unknown-parameter",
            DiagnosticKind::TypeMismatch => "type-mismatch",
            DiagnosticKind::DomainViolation => "domain-violation",
            DiagnosticKind::MissingRequired => "missing-required",
            DiagnosticKind::ConditionallyIrrelevant => "conditionally-irrelevant",
            DiagnosticKind::DuplicateSection => "duplicate-section",
            DiagnosticKind::DuplicateParameter => "duplicate-parameter",
            DiagnosticKind::UniquenessViolation => "uniqueness-violation",
            DiagnosticKind::MissingSection => "missing-section",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a diagnostic in the source deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePos {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Arc<str>>,
    pub line: usize,
    /// 1-based column; `None` when only the line is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl SourcePos {
    pub fn new(file: Option<Arc<str>>, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column: Some(column),
        }
    }

    pub fn line_only(file: Option<Arc<str>>, line: usize) -> Self {
        Self {
            file,
            line,
            column: None,
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file)?;
        }
        write!(f, "{}", self.line)?;
        if let Some(column) = self.column {
            write!(f, ":{}", column)?;
        }
        Ok(())
    }
}

/// A single finding about a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Section/key path, e.g. `MATERIALS.MAT[1].YIELD`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePos>,
    /// Closest known name, for unknown sections, keys and enum values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            path: path.into(),
            pos: None,
            suggestion: None,
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, path, message)
        }
    }

    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = &self.pos {
            write!(f, "{}: ", pos)?;
        }
        write!(f, "{} [{}]", self.severity, self.kind)?;
        if !self.path.is_empty() {
            write!(f, " {}", self.path)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

// ============================================================================
// COLLECTION
// ============================================================================

/// Append-only list of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// Promote every warning to an error.
    pub fn escalate_warnings(&mut self) {
        for d in &mut self.items {
            d.severity = Severity::Error;
        }
    }

    /// Order by source position. Position-less diagnostics go last; ties keep
    /// insertion order.
    pub fn sort_by_position(&mut self) {
        self.items.sort_by_key(|d| match &d.pos {
            Some(pos) => (0u8, pos.line, pos.column.unwrap_or(0)),
            None => (1u8, 0, 0),
        });
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_position_is_stable() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error(DiagnosticKind::MissingSection, "IO", "missing"));
        diags.push(
            Diagnostic::warning(DiagnosticKind::UnknownParameter, "A.X", "unknown")
                .at(SourcePos::new(None, 9, 1)),
        );
        diags.push(
            Diagnostic::error(DiagnosticKind::TypeMismatch, "A.Y", "bad")
                .at(SourcePos::line_only(None, 3)),
        );
        diags.push(
            Diagnostic::error(DiagnosticKind::DomainViolation, "A.Z", "bad")
                .at(SourcePos::new(None, 3, 1)),
        );
        diags.sort_by_position();

        let paths: Vec<_> = diags.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["A.Y", "A.Z", "A.X", "IO"]);
    }

    #[test]
    fn test_display_includes_position_and_suggestion() {
        let d = Diagnostic::warning(DiagnosticKind::UnknownSection, "MATERIAL", "unknown section")
            .at(SourcePos::new(Some(Arc::from("deck.dat")), 4, 1))
            .with_suggestion(Some("MATERIALS".to_string()));
        assert_eq!(
            d.to_string(),
            "deck.dat:4:1: warning [unknown-section] MATERIAL: unknown section (did you mean 'MATERIALS'?)"
        );
    }

    #[test]
    fn test_counts() {
        let diags: Diagnostics = vec![
            Diagnostic::warning(DiagnosticKind::UnknownParameter, "A.B", "w"),
            Diagnostic::error(DiagnosticKind::TypeMismatch, "A.C", "e"),
        ]
        .into_iter()
        .collect();
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_json_round_trip_keeps_file() {
        let mut diags = Diagnostics::new();
        diags.push(
            Diagnostic::error(DiagnosticKind::DomainViolation, "IO.STEPS", "below minimum")
                .at(SourcePos::new(Some(Arc::from("case.dat")), 4, 7)),
        );
        let json = serde_json::to_string(&diags).unwrap();
        assert!(json.contains("\"case.dat\""), "{}", json);
        let back: Diagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diags);
    }
}
